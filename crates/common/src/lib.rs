//! LicenseCore Common Library
//!
//! Shared code for the LicenseCore services including:
//! - Database models, the `LicenseStore` trait and its backends
//! - License key generation
//! - Activation, statistics and bulk intake services
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod keys;
pub mod metrics;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{LicenseStore, MemoryStore, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
