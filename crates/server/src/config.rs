//! Settings loaded from `finsight.toml` (or `$FINSIGHT_CONFIG`), then
//! overridden by `FINSIGHT_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use finsight_core::CategoryMatching;
use finsight_extract::ChatCompletionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "finsight.toml";
/// Database path that selects a throwaway in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Which category taxonomy the pipeline offers and resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMode {
    #[default]
    Global,
    PerUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub log_format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("finsight.db"),
        }
    }
}

impl DatabaseSettings {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_DATABASE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySettings {
    pub mode: CategoryMode,
    pub matching: CategoryMatching,
    /// Shown after amounts in confirmations, e.g. `EGP`.
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub llm: ChatCompletionConfig,
    pub categories: CategorySettings,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Like [`Settings::load`], with `lookup` standing in for the environment.
    ///
    /// A missing default file is not an error; a missing file named by
    /// `FINSIGHT_CONFIG` is.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let explicit = lookup("FINSIGHT_CONFIG");
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut settings = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        settings.apply_overrides(lookup)?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = lookup("FINSIGHT_LLM_API_KEY").or_else(|| lookup("API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("FINSIGHT_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("FINSIGHT_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(value) = lookup("FINSIGHT_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("FINSIGHT_LLM_TEMPERATURE", value)?;
        }
        if let Some(value) = lookup("FINSIGHT_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("FINSIGHT_LLM_MAX_TOKENS", value)?;
        }
        if let Some(value) = lookup("FINSIGHT_LLM_TIMEOUT") {
            self.llm.timeout_seconds = parse_env("FINSIGHT_LLM_TIMEOUT", value)?;
        }
        if let Some(path) = lookup("FINSIGHT_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(bind) = lookup("FINSIGHT_BIND") {
            self.server.bind = bind;
        }
        if let Some(value) = lookup("FINSIGHT_CATEGORY_MODE") {
            self.categories.mode = match value.trim().to_lowercase().as_str() {
                "global" => CategoryMode::Global,
                "per_user" | "per-user" => CategoryMode::PerUser,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "FINSIGHT_CATEGORY_MODE",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("FINSIGHT_LOG_FORMAT") {
            self.server.log_format = match value.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "FINSIGHT_LOG_FORMAT",
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}
