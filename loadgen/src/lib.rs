//! Load generator for URL-shortener services.
//!
//! A ramp of [`stage::Stage`]s sets how many virtual users run at any moment.
//! Each virtual user loops over a three-request iteration (create, custom
//! create, resolve), checks every response and feeds one shared
//! [`metrics::MetricsAggregator`].

pub mod check;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod planner;
pub mod scenario;
pub mod scheduler;
pub mod stage;
pub mod statistics;
