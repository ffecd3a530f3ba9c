use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port the sandbox runtime's health endpoint listens on.
pub const DEFAULT_HEALTH_PORT: u16 = 8330;

/// Provider connection settings, resolved once per invocation from the
/// selected environment's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API domain, e.g. `e2b.dev`. Scheme-less; the client derives
    /// `https://api.{domain}` and per-sandbox hostnames from it.
    pub domain: String,
    pub api_key: String,
    pub template_id: String,
    /// Timeout for the creation request itself, not the sandbox lifetime.
    pub request_timeout: Duration,
    pub health_port: u16,
}

impl ProviderConfig {
    pub fn new(
        domain: impl Into<String>,
        api_key: impl Into<String>,
        template_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            api_key: api_key.into(),
            template_id: template_id.into(),
            request_timeout: Duration::from_secs(30),
            health_port: DEFAULT_HEALTH_PORT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_health_port(mut self, port: u16) -> Self {
        self.health_port = port;
        self
    }

    /// Base URL of the provider's management API.
    pub fn api_base(&self) -> String {
        format!("https://api.{}", self.domain)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.domain.is_empty() {
            return Err("API domain cannot be empty".to_string());
        }

        if self.domain.contains("://") {
            return Err("API domain must not include a scheme".to_string());
        }

        if self.api_key.is_empty() {
            return Err("API key cannot be empty".to_string());
        }

        if self.template_id.is_empty() {
            return Err("Template id cannot be empty".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::new("e2b.dev", "key-123", "tmpl-456")
    }

    #[test]
    fn test_new_config() {
        let config = config();
        assert_eq!(config.domain, "e2b.dev");
        assert_eq!(config.health_port, DEFAULT_HEALTH_PORT);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_base() {
        assert_eq!(config().api_base(), "https://api.e2b.dev");
    }

    #[test]
    fn test_builder() {
        let config = config()
            .with_request_timeout(Duration::from_secs(60))
            .with_health_port(9000);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.health_port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = config();
        config.domain = String::new();
        assert!(config.validate().is_err());

        config.domain = "https://e2b.dev".to_string();
        assert!(config.validate().is_err());

        config.domain = "e2b.dev".to_string();
        config.api_key = String::new();
        assert!(config.validate().is_err());

        config.api_key = "key-123".to_string();
        config.template_id = String::new();
        assert!(config.validate().is_err());

        config.template_id = "tmpl-456".to_string();
        config.request_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }
}
