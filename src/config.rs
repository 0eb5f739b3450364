//! User configuration.
//!
//! Settings live in `$XDG_CONFIG_HOME/claudecli/config.yaml`. The file is
//! written with defaults on first run; keys missing from an existing file fall
//! back to their defaults, and unknown keys are ignored.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::api::DEFAULT_TIMEOUT_SECS;
use crate::codebase::{ScanOptions, MAX_READABLE_FILE_SIZE};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub const HAIKU: &str = "claude-haiku-4-5";
pub const SONNET: &str = "claude-sonnet-4-5";
pub const OPUS: &str = "claude-opus-4-1";

const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub anthropic_api_url: String,
    pub anthropic_model: String,
    /// Temperature for conversational turns; code generation always uses 0.0
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Files larger than this many bytes are skipped when loading a codebase
    pub max_file_size: u64,
    /// Directory names skipped in addition to build caches
    pub ignore_dirs: Vec<String>,
    pub save_transcripts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_url: "https://api.anthropic.com".to_string(),
            anthropic_model: HAIKU.to_string(),
            temperature: 1.0,
            max_tokens: 4000,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_file_size: MAX_READABLE_FILE_SIZE,
            ignore_dirs: Vec::new(),
            save_transcripts: true,
        }
    }
}

/// Base directory for configuration and saved sessions.
pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine configuration directory")?
        .join("claudecli"))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

impl Config {
    /// Read the config at `path`, writing the defaults there if it is missing.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        };

        debug!("Loaded configuration from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            ignore_dirs: self.ignore_dirs.clone(),
            max_file_size: self.max_file_size,
        }
    }
}

/// Map a short model name to its full id. Other names pass through unchanged.
pub fn resolve_model(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "haiku" => HAIKU.to_string(),
        "sonnet" => SONNET.to_string(),
        "opus" => OPUS.to_string(),
        _ => name.to_string(),
    }
}

/// Read the API key from the environment.
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => bail!("Please set the {} environment variable.", API_KEY_ENV),
    }
}
