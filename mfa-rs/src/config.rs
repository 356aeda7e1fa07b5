use crate::error::{MfaError, Result};
use crate::totp::{PolicyError, PolicyValidator, TotpPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub totp: TotpPolicy,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MfaError::Config(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MfaError::Config(e.to_string()))
    }

    /// Normalize the TOTP policy, returning every violation found
    pub fn validate_totp(mut self) -> (Self, Vec<PolicyError>) {
        let validated = PolicyValidator::default().validate(self.totp);
        self.totp = validated.policy;

        (self, validated.errors)
    }

    pub fn default() -> Self {
        Self {
            totp: TotpPolicy::default(),
            storage: StorageConfig {
                database_url: "sqlite://mfa.db?mode=rwc".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}
