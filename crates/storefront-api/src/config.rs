//! # Service Configuration
//!
//! Read once at startup from environment variables. Absent variables take
//! their defaults; present but unparseable values abort startup instead of
//! silently falling back.
//!
//! | Variable                     | Default | Meaning                              |
//! |------------------------------|---------|--------------------------------------|
//! | `PORT`                       | 8080    | HTTP listen port                     |
//! | `AUTH_TOKEN`                 | unset   | Bearer secret; unset disables auth   |
//! | `STOREFRONT_TAX_RATE`        | 8       | Tax percentage for `price_with_tax`  |
//! | `STOREFRONT_PAGE_SIZE`       | 10      | Default product page size            |
//! | `STOREFRONT_LOW_INVENTORY`   | 10      | Low-stock threshold                  |
//! | `STOREFRONT_RATE_LIMIT`      | 1000    | Requests per caller per minute       |
//! | `STOREFRONT_METRICS_ENABLED` | true    | Serve `/metrics`                     |
//!
//! `DATABASE_URL` is read separately by [`crate::db::init_pool`].

use storefront_core::{TaxRate, DEFAULT_LOW_INVENTORY_THRESHOLD};
use thiserror::Error;

/// Largest page size any list endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Invalid configuration value.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set but its value does not parse.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    pub tax_rate: TaxRate,
    pub page_size: u32,
    pub low_inventory_threshold: u32,
    pub rate_limit_per_minute: u64,
    pub metrics_enabled: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("tax_rate", &self.tax_rate)
            .field("page_size", &self.page_size)
            .field("low_inventory_threshold", &self.low_inventory_threshold)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            tax_rate: TaxRate::DEFAULT,
            page_size: 10,
            low_inventory_threshold: DEFAULT_LOW_INVENTORY_THRESHOLD,
            rate_limit_per_minute: 1000,
            metrics_enabled: true,
        }
    }
}

impl AppConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = parse_var(&lookup, "PORT", defaults.port, |v| {
            v.parse::<u16>().map_err(|e| e.to_string())
        })?;

        let auth_token = lookup("AUTH_TOKEN").filter(|t| !t.is_empty());

        let tax_rate = parse_var(&lookup, "STOREFRONT_TAX_RATE", defaults.tax_rate, |v| {
            TaxRate::parse_percent(v).map_err(|e| e.to_string())
        })?;

        let page_size = parse_var(&lookup, "STOREFRONT_PAGE_SIZE", defaults.page_size, |v| {
            match v.parse::<u32>() {
                Ok(n) if (1..=MAX_PAGE_SIZE).contains(&n) => Ok(n),
                Ok(n) => Err(format!("must be between 1 and {MAX_PAGE_SIZE}, got {n}")),
                Err(e) => Err(e.to_string()),
            }
        })?;

        let low_inventory_threshold = parse_var(
            &lookup,
            "STOREFRONT_LOW_INVENTORY",
            defaults.low_inventory_threshold,
            |v| v.parse::<u32>().map_err(|e| e.to_string()),
        )?;

        let rate_limit_per_minute = parse_var(
            &lookup,
            "STOREFRONT_RATE_LIMIT",
            defaults.rate_limit_per_minute,
            |v| match v.parse::<u64>() {
                Ok(0) => Err("must be at least 1".to_string()),
                Ok(n) => Ok(n),
                Err(e) => Err(e.to_string()),
            },
        )?;

        let metrics_enabled = parse_var(
            &lookup,
            "STOREFRONT_METRICS_ENABLED",
            defaults.metrics_enabled,
            |v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                other => Err(format!("expected true or false, got {other}")),
            },
        )?;

        Ok(Self {
            port,
            auth_token,
            tax_rate,
            page_size,
            low_inventory_threshold,
            rate_limit_per_minute,
            metrics_enabled,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            parse(trimmed).map_err(|reason| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason,
            })
        }
    }
}
