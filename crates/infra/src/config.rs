//! Configuration loading and representation.
//!
//! Everything comes from environment variables; `from_lookup` takes any
//! key → value source so tests need not touch the process environment.

use core::str::FromStr;
use std::net::SocketAddr;
use std::time::Duration;

use docmint_observability::LogFormat;
use docmint_payments::Amount;

use crate::jobs::FailureSettlement;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,

    pub payment_service_url: String,
    pub payment_api_key: String,
    pub network: String,
    pub agent_identifier: String,
    /// Echoed to buyers in the job receipt
    pub seller_vkey: String,
    /// Advertised price
    pub amount: Amount,
    pub payment_poll_interval: Duration,
    /// How long an unpaid job is watched: the pay-by window plus a grace period
    pub payment_watch_limit: Duration,
    pub failure_settlement: FailureSettlement,

    pub tool_server_url: String,
    pub tool_server_api_key: String,
    pub pinata_api_url: String,
    pub pinata_jwt: String,
    pub publish_enabled: bool,
    pub mint_enabled: bool,

    /// Timeout of each remote call
    pub request_timeout: Duration,
    /// Upper bound of each pipeline step
    pub step_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let default_amount = Amount::default();

        Ok(Self {
            bind_addr: env.parse_or("BIND_ADDR", "0.0.0.0:8000")?,
            log_format: env.parse_or("LOG_FORMAT", "json")?,

            payment_service_url: env.required("PAYMENT_SERVICE_URL")?,
            payment_api_key: env.required("PAYMENT_API_KEY")?,
            network: env.or("NETWORK", "Preprod"),
            agent_identifier: env.required("AGENT_IDENTIFIER")?,
            seller_vkey: env.or("SELLER_VKEY", ""),
            amount: Amount {
                amount: env.or("PAYMENT_AMOUNT", &default_amount.amount),
                unit: env.or("PAYMENT_UNIT", &default_amount.unit),
            },
            payment_poll_interval: env.secs_or("PAYMENT_POLL_INTERVAL_SECS", 60)?,
            payment_watch_limit: env.secs_or("PAYMENT_WATCH_LIMIT_SECS", 13 * 3600)?,
            failure_settlement: env.parse_or("ON_PIPELINE_FAILURE", "withhold")?,

            tool_server_url: env.required("TOOL_SERVER_URL")?,
            tool_server_api_key: env.or("TOOL_SERVER_API_KEY", ""),
            pinata_api_url: env.or("PINATA_API_URL", "https://api.pinata.cloud"),
            pinata_jwt: env.or("PINATA_JWT", ""),
            publish_enabled: env.flag_or("PIPELINE_PUBLISH", true)?,
            mint_enabled: env.flag_or("PIPELINE_MINT", true)?,

            request_timeout: env.secs_or("REQUEST_TIMEOUT_SECS", 30)?,
            step_timeout: env.secs_or("STEP_TIMEOUT_SECS", 60)?,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.or(key, default);
        value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })
    }

    fn secs_or(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse_or(key, &default.to_string())?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                key,
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }

    fn flag_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key,
                    value: v,
                    reason: "expected a boolean".to_string(),
                }),
            },
        }
    }
}
