//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use bigdecimal::BigDecimal;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub fees: FeesConfig,
    pub currency: CurrencyConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Payment gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub callback_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Platform fee configuration
#[derive(Debug, Clone)]
pub struct FeesConfig {
    pub commission_rate: BigDecimal,
    pub tax_rate: BigDecimal,
}

/// Currency conversion configuration
#[derive(Debug, Clone)]
pub struct CurrencyConfig {
    pub reference_currency: String,
    pub cache_ttl_seconds: u64,
    pub rate_api_url: String,
    pub rate_api_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub enable_tracing: bool,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            database: DatabaseConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            fees: FeesConfig::from_env()?,
            currency: CurrencyConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.gateway.validate()?;
        self.fees.validate()?;
        self.currency.validate()?;

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URL cannot be empty".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DB_MAX_CONNECTIONS cannot be 0".to_string(),
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS cannot exceed DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(GatewayConfig {
            secret_key: env::var("GATEWAY_SECRET_KEY")
                .map_err(|_| ConfigError::MissingVariable("GATEWAY_SECRET_KEY".to_string()))?,
            webhook_secret: env::var("GATEWAY_WEBHOOK_SECRET").ok(),
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.fedapay.com/v1".to_string()),
            callback_url: env::var("GATEWAY_CALLBACK_URL")
                .map_err(|_| ConfigError::MissingVariable("GATEWAY_CALLBACK_URL".to_string()))?,
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_TIMEOUT_SECS".to_string()))?,
            max_retries: env::var("GATEWAY_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("GATEWAY_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_SECRET_KEY cannot be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_TIMEOUT_SECS cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl FeesConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let commission = env::var("PLATFORM_COMMISSION_RATE").unwrap_or_else(|_| "0.01".to_string());
        let tax = env::var("PLATFORM_TAX_RATE").unwrap_or_else(|_| "0.18".to_string());

        Ok(FeesConfig {
            commission_rate: BigDecimal::from_str(&commission)
                .map_err(|_| ConfigError::InvalidValue("PLATFORM_COMMISSION_RATE".to_string()))?,
            tax_rate: BigDecimal::from_str(&tax)
                .map_err(|_| ConfigError::InvalidValue("PLATFORM_TAX_RATE".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = BigDecimal::from(0);
        let one = BigDecimal::from(1);

        if self.commission_rate < zero || self.commission_rate >= one {
            return Err(ConfigError::InvalidValue(
                "PLATFORM_COMMISSION_RATE must be in [0, 1)".to_string(),
            ));
        }

        if self.tax_rate < zero || self.tax_rate >= one {
            return Err(ConfigError::InvalidValue(
                "PLATFORM_TAX_RATE must be in [0, 1)".to_string(),
            ));
        }

        Ok(())
    }
}

impl CurrencyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CurrencyConfig {
            reference_currency: env::var("REFERENCE_CURRENCY")
                .unwrap_or_else(|_| "XOF".to_string()),
            cache_ttl_seconds: env::var("RATE_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATE_CACHE_TTL_SECONDS".to_string()))?,
            rate_api_url: env::var("RATE_API_URL")
                .unwrap_or_else(|_| "https://open.er-api.com/v6/latest".to_string()),
            rate_api_timeout_secs: env::var("RATE_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RATE_API_TIMEOUT_SECS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_currency.len() != 3 {
            return Err(ConfigError::InvalidValue(
                "REFERENCE_CURRENCY must be a 3-letter code".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "plain".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Plain,
        };

        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format,
            enable_tracing: env::var("ENABLE_TRACING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_rates_outside_unit_interval_are_rejected() {
        let config = FeesConfig {
            commission_rate: BigDecimal::from_str("1.5").unwrap(),
            tax_rate: BigDecimal::from_str("0.18").unwrap(),
        };
        assert!(config.validate().is_err());

        let config = FeesConfig {
            commission_rate: BigDecimal::from_str("0.01").unwrap(),
            tax_rate: BigDecimal::from_str("0.18").unwrap(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reference_currency_must_be_three_letters() {
        let config = CurrencyConfig {
            reference_currency: "FRANC".to_string(),
            cache_ttl_seconds: 60,
            rate_api_url: "https://open.er-api.com/v6/latest".to_string(),
            rate_api_timeout_secs: 10,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_connections_cannot_exceed_max() {
        let config = DatabaseConfig {
            url: "postgresql://localhost/caresettle".to_string(),
            max_connections: 5,
            min_connections: 10,
            connection_timeout: 30,
            idle_timeout: None,
        };
        assert!(config.validate().is_err());
    }
}
