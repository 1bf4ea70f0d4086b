//! Configuration loading and representation.
//!
//! Sources, later ones winning: built-in defaults, an optional `tillbook.toml`
//! in the working directory, then `TILLBOOK__*` environment variables
//! (`TILLBOOK__TAX__ENDPOINT`, `TILLBOOK__RATE_LIMIT__CUSTOMER_EDITS`, ...).
//! A `.env` file is loaded into the environment first when present.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use tillbook_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

/// Upper bound for `invoice_due_days` (ten years).
pub const MAX_INVOICE_DUE_DAYS: i64 = 3650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Strategy for new customer numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerNumbering {
    /// Atomic per-scope counter, like quotations and invoices.
    #[default]
    Sequential,
    /// Random suffix with a bounded uniqueness probe.
    Random,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    /// Tax collaborator URL. Absent disables tax (always zero, with a warning).
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 3_000,
        }
    }
}

impl TaxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Customer edits allowed per user per window.
    pub customer_edits: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            customer_edits: 10,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub customer_strategy: CustomerNumbering,
    /// Insert attempts before a number conflict is reported.
    pub max_attempts: u32,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            customer_strategy: CustomerNumbering::Sequential,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Postgres URL. Absent runs on in-memory stores.
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub log_format: LogFormat,
    pub invoice_due_days: i64,
    pub tax: TaxConfig,
    pub rate_limit: RateLimitConfig,
    pub numbering: NumberingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            jwt_secret: None,
            log_format: LogFormat::Json,
            invoice_due_days: 30,
            tax: TaxConfig::default(),
            rate_limit: RateLimitConfig::default(),
            numbering: NumberingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env`, `tillbook.toml` and `TILLBOOK__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("tillbook").required(false))
            .add_source(
                config::Environment::with_prefix("TILLBOOK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.customer_edits == 0 {
            return Err(ConfigError::Invalid("rate_limit.customer_edits must be at least 1".to_string()));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid("rate_limit.window_secs must be at least 1".to_string()));
        }
        if !(0..=MAX_INVOICE_DUE_DAYS).contains(&self.invoice_due_days) {
            return Err(ConfigError::Invalid(format!(
                "invoice_due_days must be between 0 and {MAX_INVOICE_DUE_DAYS}"
            )));
        }
        Ok(())
    }

    /// Configured signing secret, or the insecure development default.
    pub fn jwt_secret(&self) -> &str {
        match self.jwt_secret.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => {
                tracing::warn!("jwt_secret not set; using insecure dev default");
                DEV_JWT_SECRET
            }
        }
    }
}
