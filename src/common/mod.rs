//! Common Infrastructure Module
//!
//! Shared utilities and configuration:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{AppConfig, ConfigError, Network};
pub use error::{ApiError, Result, VALIDATION_CODE};
pub use logging::{generate_correlation_id, init_logging, LoggingError};
