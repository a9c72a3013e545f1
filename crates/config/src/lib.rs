//! Configuration loading, validation, and management for clawcraft.
//!
//! Loads configuration from `~/.clawcraft/config.toml` with environment
//! variable overrides. Validates all settings at startup; a missing LLM
//! API key is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.clawcraft/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game endpoint settings
    #[serde(default)]
    pub game: GameConfig,

    /// LLM service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Bot behavior toggles
    #[serde(default)]
    pub bot: BotConfig,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversational memory settings
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_game_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    /// Protocol version tag; empty means auto-detect.
    #[serde(default)]
    pub version: String,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_game_port() -> u16 {
    25565
}
fn default_username() -> String {
    "clawcraft".into()
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_game_port(),
            username: default_username(),
            version: String::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// API key; can also come from the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override for self-hosted or proxy endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Bound on model↔tool continuation rounds per exchange.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_tool_iterations() -> u32 {
    8
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            max_tool_iterations: default_max_tool_iterations(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("max_tool_iterations", &self.max_tool_iterations)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("game", &self.game)
            .field("llm", &self.llm)
            .field("bot", &self.bot)
            .field("storage", &self.storage)
            .field("memory", &self.memory)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_true")]
    pub auto_eat: bool,

    #[serde(default = "default_true")]
    pub auto_armor: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            auto_eat: true,
            auto_armor: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. `:memory:` for ephemeral.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "clawcraft.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Prompt-token budget before the context is trimmed.
    #[serde(default = "default_memory_max_tokens")]
    pub max_tokens: u32,

    /// How many recent messages survive a trim.
    #[serde(default = "default_keep_messages")]
    pub keep_messages: usize,
}

fn default_memory_max_tokens() -> u32 {
    8000
}
fn default_keep_messages() -> usize {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_memory_max_tokens(),
            keep_messages: default_keep_messages(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.clawcraft/config.toml).
    ///
    /// Also checks environment variables:
    /// - `CLAWCRAFT_API_KEY` (highest priority), `OPENAI_API_KEY`
    /// - `CLAWCRAFT_MODEL`, `CLAWCRAFT_HOST`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("CLAWCRAFT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(model) = std::env::var("CLAWCRAFT_MODEL") {
            config.llm.model = model;
        }
        if let Ok(host) = std::env::var("CLAWCRAFT_HOST") {
            config.game.host = host;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clawcraft")
    }

    /// Validate the configuration. Called on load; the CLI calls
    /// `require_api_key` separately after env overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Validation(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(ConfigError::Validation(
                "llm.top_p must be between 0.0 and 1.0".into(),
            ));
        }
        if self.llm.max_tool_iterations == 0 {
            return Err(ConfigError::Validation(
                "llm.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.memory.keep_messages == 0 {
            return Err(ConfigError::Validation(
                "memory.keep_messages must be at least 1".into(),
            ));
        }
        if self.game.username.is_empty() {
            return Err(ConfigError::Validation(
                "game.username must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Fail unless an API key is available. Fatal at startup.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.llm
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(
                    "llm.api_key is required (set it in config.toml or CLAWCRAFT_API_KEY)".into(),
                )
            })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game: GameConfig::default(),
            llm: LlmConfig::default(),
            bot: BotConfig::default(),
            storage: StorageConfig::default(),
            memory: MemoryConfig::default(),
        }
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
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.game.port, 25565);
        assert!(config.bot.auto_eat);
        assert_eq!(config.memory.keep_messages, 20);
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let config = AppConfig::default();
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn api_key_from_config_accepted() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".into());
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_keep_messages_rejected() {
        let mut config = AppConfig::default();
        config.memory.keep_messages = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_roundtrip_toml() {
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.game.host, "localhost");
        assert_eq!(parsed.llm.max_tool_iterations, 8);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [llm]
            model = "gpt-4o"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.llm.model, "gpt-4o");
        assert_eq!(parsed.llm.temperature, 0.7);
        assert_eq!(parsed.game.username, "clawcraft");
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
