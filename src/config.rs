//! Viewer configuration

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_FILENAME: &str = "config.toml";
const APP_NAME: &str = "readroom";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Base URL of the persistence API
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Bearer credential; absent means session tracking stays off
    #[serde(default)]
    pub token: Option<String>,

    /// Where the local progress cache lives; absent picks the default
    /// location under the user data dir
    #[serde(default)]
    pub progress_cache_path: Option<PathBuf>,

    /// Resize quiescence window in milliseconds
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,

    /// Inactivity timeout in seconds before a session auto-ends
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,

    /// Mid-session flush interval in seconds; 0 disables checkpoints
    #[serde(default)]
    pub checkpoint_interval_secs: u64,

    /// Raster cache capacity in pages
    #[serde(default = "default_render_cache_pages")]
    pub render_cache_pages: usize,
}

fn default_server_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_resize_debounce_ms() -> u64 {
    250
}

fn default_inactivity_timeout_secs() -> u64 {
    5 * 60
}

fn default_render_cache_pages() -> usize {
    8
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            token: None,
            progress_cache_path: None,
            resize_debounce_ms: default_resize_debounce_ms(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            checkpoint_interval_secs: 0,
            render_cache_pages: default_render_cache_pages(),
        }
    }
}

impl ViewerConfig {
    /// Load from the user config dir, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("Could not determine config directory, using default settings");
            return Self::default();
        };

        if !path.exists() {
            info!("No config at {path:?}, using defaults");
            return Self::default();
        }

        Self::load_from_path(&path).unwrap_or_else(|e| {
            warn!("Failed to load config from {path:?}: {e}");
            Self::default()
        })
    }

    pub fn load_from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config| config.join(APP_NAME).join(CONFIG_FILENAME))
    }

    /// Default location of the local progress cache
    #[must_use]
    pub fn default_progress_cache_path() -> Option<PathBuf> {
        dirs::data_dir().map(|data| data.join(APP_NAME).join("progress.json"))
    }

    /// Effective progress cache path as a string, if any
    #[must_use]
    pub fn progress_cache_file(&self) -> Option<String> {
        self.progress_cache_path
            .clone()
            .or_else(Self::default_progress_cache_path)
            .map(|p| p.to_string_lossy().into_owned())
    }

    #[must_use]
    pub fn resize_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.resize_debounce_ms)
    }

    #[must_use]
    pub fn inactivity_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.inactivity_timeout_secs)
    }

    #[must_use]
    pub fn checkpoint_interval(&self) -> Option<std::time::Duration> {
        if self.checkpoint_interval_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.checkpoint_interval_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config: ViewerConfig = toml::from_str("").unwrap();
        assert_eq!(config.resize_debounce_ms, 250);
        assert_eq!(config.inactivity_timeout_secs, 300);
        assert!(config.token.is_none());
        assert!(config.checkpoint_interval().is_none());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: ViewerConfig = toml::from_str(
            r#"
            token = "secret"
            checkpoint_interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(
            config.checkpoint_interval(),
            Some(std::time::Duration::from_secs(60))
        );
        assert_eq!(config.render_cache_pages, 8);
    }
}
