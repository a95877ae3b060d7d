//! Configuration loading, validation, and management for skein.
//!
//! Loads configuration from `~/.skein/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.skein/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeinConfig {
    /// Defaults for completion requests
    #[serde(default)]
    pub completion: CompletionDefaults,

    /// Invocation pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Planner budgets and function filters
    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Defaults applied to completion requests that don't set their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for CompletionDefaults {
    fn default() -> Self {
        Self {
            model_id: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on how often one step may be repeated by observers
    #[serde(default = "default_max_repeats")]
    pub max_repeats: u32,
}

fn default_max_repeats() -> u32 {
    8
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_repeats: default_max_repeats(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum reason/act iterations before the run fails
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Token budget for one rendered planner prompt
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,

    /// Tokens the model may generate per iteration
    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,

    /// Malformed responses tolerated within one iteration
    #[serde(default = "default_max_malformed_retries")]
    pub max_malformed_retries: u32,

    /// Plugins hidden from the function listing
    #[serde(default)]
    pub excluded_plugins: Vec<String>,

    /// Functions (by bare name) hidden from the function listing
    #[serde(default)]
    pub excluded_functions: Vec<String>,

    /// If non-empty, only these functions are listed
    #[serde(default)]
    pub included_functions: Vec<String>,
}

fn default_max_iterations() -> u32 {
    15
}

fn default_max_prompt_tokens() -> usize {
    4000
}

fn default_max_completion_tokens() -> u32 {
    1024
}

fn default_max_malformed_retries() -> u32 {
    3
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_prompt_tokens: default_max_prompt_tokens(),
            max_completion_tokens: default_max_completion_tokens(),
            max_malformed_retries: default_max_malformed_retries(),
            excluded_plugins: Vec::new(),
            excluded_functions: Vec::new(),
            included_functions: Vec::new(),
        }
    }
}

impl SkeinConfig {
    /// Load configuration from the default path (~/.skein/config.toml).
    ///
    /// Environment variables override file values:
    /// - `SKEIN_MODEL`
    /// - `SKEIN_TEMPERATURE`
    /// - `SKEIN_MAX_ITERATIONS`
    /// - `SKEIN_MAX_PROMPT_TOKENS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("SKEIN_MODEL") {
            self.completion.model_id = Some(model);
        }
        if let Some(value) = lookup("SKEIN_TEMPERATURE") {
            match value.parse() {
                Ok(t) => self.completion.temperature = t,
                Err(_) => tracing::warn!(value = %value, "Ignoring invalid SKEIN_TEMPERATURE"),
            }
        }
        if let Some(value) = lookup("SKEIN_MAX_ITERATIONS") {
            match value.parse() {
                Ok(n) => self.planner.max_iterations = n,
                Err(_) => tracing::warn!(value = %value, "Ignoring invalid SKEIN_MAX_ITERATIONS"),
            }
        }
        if let Some(value) = lookup("SKEIN_MAX_PROMPT_TOKENS") {
            match value.parse() {
                Ok(n) => self.planner.max_prompt_tokens = n,
                Err(_) => tracing::warn!(value = %value, "Ignoring invalid SKEIN_MAX_PROMPT_TOKENS"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".skein")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::ValidationError(
                "completion.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.planner.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "planner.max_iterations must be at least 1".into(),
            ));
        }

        if self.planner.max_prompt_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "planner.max_prompt_tokens must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Render the default configuration as TOML.
    pub fn default_toml() -> String {
        Self::default().to_toml()
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
