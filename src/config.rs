use crate::error::ConfigurationError;
use crate::services::endpoints::{EndpointTable, Environment};
use crate::services::posnet_client::Credentials;
use std::time::Duration;

/// Gateway settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub credentials: Credentials,
    pub environment: Environment,
    pub endpoints: EndpointTable,
    pub timeout: Duration,
    pub return_url: Option<String>,
    pub lang: String,
    pub host: String,
    pub port: u16,
    pub service_key: String,
    pub service_header: String,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub trust_forwarded_headers: bool,
}

impl GatewayConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigurationError::MissingSetting(name))
        };
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let credentials = Credentials {
            merchant_id: required("POSNET_MERCHANT_ID")?,
            terminal_id: required("POSNET_TERMINAL_ID")?,
            key: required("POSNET_ENC_KEY")?,
            posnet_id: optional("POSNET_ID"),
        };

        let environment: Environment = optional("POSNET_ENVIRONMENT")
            .unwrap_or_else(|| "TEST".to_string())
            .parse()?;

        let mut endpoints = EndpointTable::default();
        if let Some(alias) = optional("POSNET_ALIAS") {
            let alias: Environment = alias.parse()?;
            endpoints = endpoints.with_endpoint(alias.clone(), &required("POSNET_ALIAS_URL")?)?;
            endpoints = endpoints.with_endpoint(alias.three_d(), &required("POSNET_ALIAS_3D_URL")?)?;
        }
        endpoints.ensure_resolves([&environment, &environment.three_d()])?;

        let rate_limit_window_secs: u64 = parse_number(&optional, "RATE_LIMIT_WINDOW_SECS", 60)?;
        if rate_limit_window_secs == 0 {
            return Err(ConfigurationError::InvalidSetting {
                name: "RATE_LIMIT_WINDOW_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            credentials,
            timeout: Duration::from_secs(parse_number(&optional, "POSNET_TIMEOUT_SECS", 30)?),
            return_url: optional("POSNET_RETURN_URL"),
            lang: optional("POSNET_LANG").unwrap_or_else(|| "tr".to_string()),
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(&optional, "PORT", 8080)?,
            service_key: required("SERVICE_KEY")?,
            service_header: optional("SERVICE_HEADER")
                .unwrap_or_else(|| "x-service-key".to_string()),
            rate_limit_max: parse_number(&optional, "RATE_LIMIT_MAX", 100)?,
            rate_limit_window_secs,
            trust_forwarded_headers: parse_number(&optional, "TRUST_FORWARDED_HEADERS", false)?,
            environment,
            endpoints,
        })
    }
}

fn parse_number<T, F>(optional: &F, name: &'static str, default: T) -> Result<T, ConfigurationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match optional(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigurationError::InvalidSetting {
                name,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
