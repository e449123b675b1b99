use crate::error::{BoardhubError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Share link configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Origin prepended to `/share/{slug}` when building share URLs
    pub base_url: String,
    pub slug_length: usize,
    /// Attempts at finding an unused slug before giving up with a conflict
    pub max_slug_attempts: u32,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            slug_length: 10,
            max_slug_attempts: 10,
        }
    }
}

impl ShareConfig {
    pub fn share_url(&self, slug: &str) -> String {
        format!("{}/share/{}", self.base_url.trim_end_matches('/'), slug)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardhubConfig {
    pub share: ShareConfig,
    pub log: LogConfig,
}

impl BoardhubConfig {
    const ENV_BASE_URL: &'static str = "BOARDHUB_BASE_URL";
    const ENV_LOG_LEVEL: &'static str = "BOARDHUB_LOG_LEVEL";

    /// Loads configuration from a JSON file; absent fields take defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await.map_err(|err| {
            BoardhubError::ConfigError(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|err| BoardhubError::ConfigError(format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `BOARDHUB_*` environment overrides
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(base_url) = std::env::var(Self::ENV_BASE_URL) {
            self.share.base_url = base_url;
        }
        if let Ok(level) = std::env::var(Self::ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.share.base_url.trim().is_empty() {
            return Err(BoardhubError::ConfigError(
                "share.base_url must not be empty".to_string(),
            ));
        }
        if self.share.slug_length == 0 {
            return Err(BoardhubError::ConfigError(
                "share.slug_length must be positive".to_string(),
            ));
        }
        if self.share.max_slug_attempts == 0 {
            return Err(BoardhubError::ConfigError(
                "share.max_slug_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
