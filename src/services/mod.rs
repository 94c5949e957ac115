pub mod activity_service;
pub mod cache_service;
pub mod invalidation;
pub mod metrics_collector;
pub mod performance_service;
pub mod reading_milestones;
pub mod scoring_engine;
pub mod settings_service;
