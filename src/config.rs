use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::errors::RetryConfig;

pub const CONFIG_FILE: &str = "lesson-editor.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Block type of the single block a never-saved page starts with.
    pub seed_block_type: String,
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsConfig {
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub sync: SyncConfig,
    pub templates: TemplatesConfig,
    pub components: ComponentsConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            seed_block_type: "text".to_string(),
            request_timeout_ms: 30000,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self { page_size: 50 }
    }
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lesson-editor");

        Self {
            data_dir,
            log_level: "info".to_string(),
            sync: SyncConfig::default(),
            templates: TemplatesConfig::default(),
            components: ComponentsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `lesson-editor.toml` and environment variables
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_overrides(|key| env::var(key).ok())?;

        std::fs::create_dir_all(&config.data_dir)?;
        Ok(config)
    }

    /// Read a config file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow!("Failed to read config file {}: {}", path.display(), e)),
        }
    }

    /// Apply `LESSON_EDITOR_*` overrides fetched through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("LESSON_EDITOR_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup("LESSON_EDITOR_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(block_type) = lookup("LESSON_EDITOR_SEED_BLOCK") {
            self.sync.seed_block_type = block_type;
        }

        if let Some(timeout) = lookup("LESSON_EDITOR_TIMEOUT_MS") {
            self.sync.request_timeout_ms = timeout
                .parse()
                .map_err(|e| anyhow!("Invalid LESSON_EDITOR_TIMEOUT_MS '{}': {}", timeout, e))?;
        }

        if let Some(attempts) = lookup("LESSON_EDITOR_RETRY_ATTEMPTS") {
            self.sync.retry.max_attempts = attempts
                .parse()
                .map_err(|e| anyhow!("Invalid LESSON_EDITOR_RETRY_ATTEMPTS '{}': {}", attempts, e))?;
        }

        Ok(())
    }

    /// Save current configuration to `lesson-editor.toml`
    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path, config_content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }
}
