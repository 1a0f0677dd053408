//! Infrastructure layer: job registry, orchestration, configuration.

pub mod config;
pub mod jobs;

pub use config::{AppConfig, ConfigError};
