//! Relay settings: a JSON file with per-field defaults, written on first run,
//! plus environment overrides for containerized deployments.

use anyhow::{Context, Result};
use burnish_core::provider::GROQ_BASE_URL;
use burnish_core::RelayConfig;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "RelaySettings::default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "RelaySettings::default_model")]
    pub model: String,
    #[serde(default = "RelaySettings::default_base_url")]
    pub base_url: String,
    #[serde(default = "RelaySettings::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "RelaySettings::default_top_p")]
    pub top_p: f32,
    #[serde(default = "RelaySettings::default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            bind_addr: Self::default_bind_addr(),
            model: Self::default_model(),
            base_url: Self::default_base_url(),
            max_tokens: Self::default_max_tokens(),
            top_p: Self::default_top_p(),
            call_timeout_secs: Self::default_call_timeout_secs(),
        }
    }
}

impl RelaySettings {
    fn default_bind_addr() -> String {
        "127.0.0.1:8787".to_string()
    }

    fn default_model() -> String {
        "moonshotai/kimi-k2-instruct".to_string()
    }

    fn default_base_url() -> String {
        GROQ_BASE_URL.to_string()
    }

    fn default_max_tokens() -> u32 {
        4096
    }

    fn default_top_p() -> f32 {
        1.0
    }

    fn default_call_timeout_secs() -> u64 {
        30
    }

    /// Load settings from `path` (or the per-user default location),
    /// writing defaults when the file is missing or unreadable.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => Ok(settings),
                Err(err) => {
                    warn!(
                        error = ?err,
                        path = %path.display(),
                        "failed to parse relay settings, resetting to defaults"
                    );
                    let defaults = Self::default();
                    defaults.save(&path).await?;
                    Ok(defaults)
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Self::default();
                defaults.save(&path).await?;
                Ok(defaults)
            }
            Err(err) => Err(err).context("failed to read relay settings"),
        }
    }

    async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create settings directory")?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, serialized)
            .await
            .context("failed to write relay settings")?;
        Ok(())
    }

    fn default_path() -> PathBuf {
        BaseDirs::new()
            .map(|base| base.config_dir().join("burnish").join("relay_settings.json"))
            .unwrap_or_else(|| PathBuf::from("relay_settings.json"))
    }

    /// Apply `BURNISH_*` environment overrides on top of the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("BURNISH_BIND_ADDR") {
            self.bind_addr = bind;
        }
        if let Ok(model) = std::env::var("BURNISH_MODEL") {
            self.model = model;
        }
        if let Ok(base_url) = std::env::var("BURNISH_BASE_URL") {
            self.base_url = base_url;
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            model: self.model.clone(),
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}
