//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generation::GenerationBackendConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub max_payload_size: usize,
    /// Overall per-run deadline in seconds; 0 disables the deadline
    pub request_timeout_secs: u64,
    /// Empty list allows any origin
    pub cors_allowed_origins: Vec<String>,
    pub backend: GenerationBackendConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_payload_size: 1024 * 1024,
            request_timeout_secs: 120,
            cors_allowed_origins: Vec::new(),
            backend: GenerationBackendConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: "0".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }
        if self.backend.model.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "backend.model".to_string(),
            });
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "backend.base_url".to_string(),
                value: self.backend.base_url.clone(),
                reason: "must start with http:// or https://".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = AppConfig {
            port: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "port"
        ));
    }

    #[test]
    fn test_missing_model_rejected() {
        let mut config = AppConfig::default();
        config.backend.model.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { field }) if field == "backend.model"
        ));
    }

    #[test]
    fn test_bad_backend_url_rejected() {
        let mut config = AppConfig::default();
        config.backend.base_url = "localhost:8080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.request_timeout(), None);
        assert_eq!(
            AppConfig::default().request_timeout(),
            Some(Duration::from_secs(120))
        );
    }
}
