//! tdgram CLI Configuration
//!
//! A single TOML file with four sections:
//! - `[params]`: backend credentials and device metadata (required)
//! - `[settings]`: correlation engine and update queue tuning
//! - `[logging]`: level, optional log file and its rotation schedule
//! - `[login]`: answers for the authentication prompts; anything left out is
//!   asked for on stdin

use std::path::Path;

use serde::{Deserialize, Serialize};
use tdgram_core::{ClientParams, LoggingConfig, Settings};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub params: Option<ClientParams>,
    pub settings: Settings,
    pub logging: LoggingConfig,
    pub login: LoginConfig,
}

/// Preconfigured authentication answers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub bot_token: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let params = self.client_params()?;
        params.validate()?;
        self.settings.validate()?;
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(CliError::Config(format!(
                "unknown log level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn client_params(&self) -> Result<&ClientParams> {
        self.params
            .as_ref()
            .ok_or_else(|| CliError::Config("missing [params] section".to_string()))
    }
}
