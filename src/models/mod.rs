pub mod activity;
pub mod member;
pub mod metrics;
pub mod performance;
pub mod settings;
