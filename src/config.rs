//! Configuration types.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level application configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum number of delivery attempts before a message that keeps
    /// failing recoverably is dead-lettered.
    pub max_delivery_count: u32,
    /// Path of the libSQL database file backing payment rows.
    pub db_path: String,
    /// Port for the operator-facing payments API.
    pub http_port: u16,
    /// Base URL of the payment processor.
    pub payment_api_url: String,
    /// Base URL of the case-management system.
    pub case_api_url: String,
    /// Base URL of the transformation/update services.
    pub transform_api_url: String,
    /// Path of the per-service configuration file.
    pub services_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_delivery_count: 10,
            db_path: "./data/scanflow.db".to_string(),
            http_port: 8080,
            payment_api_url: "http://localhost:8583".to_string(),
            case_api_url: "http://localhost:4452".to_string(),
            transform_api_url: "http://localhost:4601".to_string(),
            services_path: "./config/services.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Build from `SCANFLOW_*` environment variables, with defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_delivery_count: parse_env("SCANFLOW_MAX_DELIVERY_COUNT", defaults.max_delivery_count)?,
            db_path: std::env::var("SCANFLOW_DB_PATH").unwrap_or(defaults.db_path),
            http_port: parse_env("SCANFLOW_HTTP_PORT", defaults.http_port)?,
            payment_api_url: std::env::var("SCANFLOW_PAYMENT_API_URL")
                .unwrap_or(defaults.payment_api_url),
            case_api_url: std::env::var("SCANFLOW_CASE_API_URL")
                .unwrap_or(defaults.case_api_url),
            transform_api_url: std::env::var("SCANFLOW_TRANSFORM_API_URL")
                .unwrap_or(defaults.transform_api_url),
            services_path: std::env::var("SCANFLOW_SERVICES_PATH")
                .unwrap_or(defaults.services_path),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Per-service configuration, keyed by the envelope's originating
/// container.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service (container) name.
    pub service: String,
    /// Jurisdiction the service's cases live in.
    pub jurisdiction: String,
    /// Whether new-application envelopes may auto-create cases.
    #[serde(default)]
    pub auto_case_creation_enabled: bool,
    /// Whether OCR supplementary-evidence envelopes may auto-update cases.
    #[serde(default)]
    pub auto_case_update_enabled: bool,
    /// Whether exception-record creation first checks for an existing
    /// record linked to the same envelope. Disabling removes only that
    /// pre-creation query, never the attach-path duplicate guard.
    #[serde(default = "default_true")]
    pub duplicate_prevention_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Registry of configured services.
///
/// Built once at startup, read-only thereafter; safe for concurrent reads.
#[derive(Debug, Default)]
pub struct ServiceConfigProvider {
    services: HashMap<String, ServiceConfig>,
}

impl ServiceConfigProvider {
    pub fn new(configs: Vec<ServiceConfig>) -> Self {
        Self {
            services: configs
                .into_iter()
                .map(|c| (c.service.clone(), c))
                .collect(),
        }
    }

    /// Load the registry from a JSON file containing an array of services.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let configs: Vec<ServiceConfig> = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        Ok(Self::new(configs))
    }

    /// Look up the configuration for a service; unknown services are a
    /// configuration error.
    pub fn get(&self, service: &str) -> Result<&ServiceConfig, ConfigError> {
        self.services
            .get(service)
            .ok_or_else(|| ConfigError::ServiceNotConfigured(service.to_string()))
    }

    /// Distinct jurisdictions across all configured services.
    pub fn jurisdictions(&self) -> Vec<String> {
        let mut jurisdictions: Vec<String> = self
            .services
            .values()
            .map(|c| c.jurisdiction.clone())
            .collect();
        jurisdictions.sort();
        jurisdictions.dedup();
        jurisdictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(service: &str) -> ServiceConfig {
        ServiceConfig {
            service: service.to_string(),
            jurisdiction: "DIVORCE".to_string(),
            auto_case_creation_enabled: true,
            auto_case_update_enabled: false,
            duplicate_prevention_enabled: true,
        }
    }

    #[test]
    fn provider_returns_configured_service() {
        let provider = ServiceConfigProvider::new(vec![sample("mailscan")]);
        let cfg = provider.get("mailscan").unwrap();
        assert_eq!(cfg.jurisdiction, "DIVORCE");
    }

    #[test]
    fn provider_rejects_unknown_service() {
        let provider = ServiceConfigProvider::new(vec![sample("mailscan")]);
        let err = provider.get("other").unwrap_err();
        assert!(matches!(err, ConfigError::ServiceNotConfigured(s) if s == "other"));
    }

    #[test]
    fn duplicate_prevention_defaults_on() {
        let cfg: ServiceConfig = serde_json::from_str(
            r#"{"service": "mailscan", "jurisdiction": "DIVORCE"}"#,
        )
        .unwrap();
        assert!(cfg.duplicate_prevention_enabled);
        assert!(!cfg.auto_case_creation_enabled);
    }
}
