//! Configuration file management for jieri.
//!
//! Supports reading secrets from `~/.config/jieri/secret.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AgentError;

/// Root configuration structure for secret.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretConfig {
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub calendarific: Option<CalendarificConfig>,
}

/// OpenAI-compatible chat endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Calendarific holiday API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarificConfig {
    pub api_key: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// Loads the secret configuration file from ~/.config/jieri/secret.json
pub fn load_secret_config() -> Result<SecretConfig, AgentError> {
    let config_path = get_config_path()?;
    load_secret_config_from(&config_path)
}

/// Loads a secret configuration file from an explicit path.
pub fn load_secret_config_from(config_path: &Path) -> Result<SecretConfig, AgentError> {
    if !config_path.exists() {
        return Err(AgentError::Config(format!(
            "configuration file not found at: {}",
            config_path.display()
        )));
    }

    let content = fs::read_to_string(config_path).map_err(|e| {
        AgentError::Config(format!(
            "failed to read configuration file at {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        AgentError::Config(format!(
            "failed to parse configuration file at {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Returns the path to the configuration file: ~/.config/jieri/secret.json
fn get_config_path() -> Result<PathBuf, AgentError> {
    let home = dirs::home_dir()
        .ok_or_else(|| AgentError::Config("could not determine home directory".to_string()))?;
    Ok(home.join(".config").join("jieri").join("secret.json"))
}
