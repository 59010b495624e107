pub mod audit;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod notifications;
pub mod store;
