//! Configuration management for the loan service
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid number for {0}")]
    InvalidNumber(String),
}

/// Deployment the service runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_level(self) -> &'static str {
        match self {
            Environment::Development => "loan_service=debug,info",
            Environment::Staging | Environment::Production => "info",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "ENVIRONMENT={} (expected dev, staging or prod)",
                raw
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        })
    }
}

/// Wording and naming of the agreement letter sent to investors
#[derive(Debug, Clone)]
pub struct AgreementConfig {
    /// Company signing the letter
    pub company_name: String,

    /// Prefix for rendered amounts
    pub currency_symbol: String,

    /// Attachment name; `{investor}` is replaced by the investor's name
    pub file_name_template: String,
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            company_name: "Company A".to_string(),
            currency_symbol: "Rp".to_string(),
            file_name_template: "agreement_letter_{investor}.pdf".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Base URL uploaded artifacts are served from
    pub upload_base_url: String,

    /// Agreement letter wording
    pub agreement: AgreementConfig,

    /// Pending funding completions held before new ones are left to the reconciler
    pub funding_queue_capacity: usize,

    /// Seconds between reconciler sweeps
    pub funding_reconcile_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            log_level: Environment::Development.default_log_level().to_string(),
            upload_base_url: "http://localhost:8080/files".to_string(),
            agreement: AgreementConfig::default(),
            funding_queue_capacity: 1024,
            funding_reconcile_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let environment = match env::var("ENVIRONMENT") {
            Ok(raw) => raw.parse::<Environment>()?,
            Err(_) => Environment::default(),
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| environment.default_log_level().to_string());

        let upload_base_url = env::var("UPLOAD_BASE_URL").unwrap_or(defaults.upload_base_url);

        let agreement = AgreementConfig {
            company_name: env::var("COMPANY_NAME").unwrap_or(defaults.agreement.company_name),
            currency_symbol: env::var("CURRENCY_SYMBOL")
                .unwrap_or(defaults.agreement.currency_symbol),
            file_name_template: env::var("AGREEMENT_LETTER_FILE_NAME")
                .unwrap_or(defaults.agreement.file_name_template),
        };

        let funding_queue_capacity =
            parse_var("FUNDING_QUEUE_CAPACITY", defaults.funding_queue_capacity)?;

        let funding_reconcile_interval_secs = parse_var(
            "FUNDING_RECONCILE_INTERVAL_SECS",
            defaults.funding_reconcile_interval_secs,
        )?;

        Ok(Config {
            environment,
            log_level,
            upload_base_url,
            agreement,
            funding_queue_capacity,
            funding_reconcile_interval_secs,
        })
    }

    pub fn funding_reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.funding_reconcile_interval_secs.max(1))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_number(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidNumber(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_from_str() {
        for (raw, expected) in [
            ("dev", Environment::Development),
            ("Development", Environment::Development),
            (" staging ", Environment::Staging),
            ("PROD", Environment::Production),
            ("production", Environment::Production),
        ] {
            assert_eq!(raw.parse::<Environment>().unwrap(), expected);
        }

        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("ENVIRONMENT=qa"));
    }

    #[test]
    fn test_environment_display_round_trips() {
        for env in [
            Environment::Development,
            Environment::Staging,
            Environment::Production,
        ] {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }

    #[test]
    fn test_default_log_level_per_environment() {
        assert_eq!(
            Environment::Development.default_log_level(),
            "loan_service=debug,info"
        );
        assert_eq!(Environment::Production.default_log_level(), "info");
        assert_eq!(Config::default().log_level, "loan_service=debug,info");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.funding_queue_capacity, 1024);
        assert_eq!(config.funding_reconcile_interval(), Duration::from_secs(60));
        assert_eq!(config.agreement.currency_symbol, "Rp");
        assert!(config.agreement.file_name_template.contains("{investor}"));
    }

    #[test]
    fn test_reconcile_interval_never_zero() {
        let config = Config {
            funding_reconcile_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.funding_reconcile_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<usize>("CAP", " 16 ").unwrap(), 16);

        let err = parse_number::<u64>("FUNDING_RECONCILE_INTERVAL_SECS", "soon").unwrap_err();
        assert!(err.to_string().contains("FUNDING_RECONCILE_INTERVAL_SECS"));
    }
}
