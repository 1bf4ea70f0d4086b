//! Infrastructure layer: configuration, storage, and external services.

pub mod config;
pub mod error;
pub mod export;
pub mod rate_limit;
pub mod sequence;
pub mod store;
pub mod tax;

pub use config::{AppConfig, ConfigError, CustomerNumbering};
pub use error::StoreError;
pub use rate_limit::{RateDecision, RateLimiter};
