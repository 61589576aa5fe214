//! Editor configuration.
//!
//! Read from a TOML file; every key is optional.
//!
//! ```toml
//! save_debounce_ms = 300
//! preview_debounce_ms = 150
//! auto_refresh_preview = true
//! drag_activation_distance = 8.0
//! attribution = "editor"
//! auto_revision_summary = "Auto-saved changes"
//! flow_capacity = 256
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Tunables for an editing session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period before a staged save is sent.
    pub save_debounce_ms: u64,
    /// Quiet period before the preview is re-projected.
    pub preview_debounce_ms: u64,
    pub auto_refresh_preview: bool,
    /// Pointer travel (px) before a press becomes a drag.
    pub drag_activation_distance: f32,
    /// Recorded on every revision.
    pub attribution: String,
    pub auto_revision_summary: String,
    /// Flow bus buffer per subscriber.
    pub flow_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 300,
            preview_debounce_ms: 150,
            auto_refresh_preview: true,
            drag_activation_distance: 8.0,
            attribution: "editor".to_string(),
            auto_revision_summary: "Auto-saved changes".to_string(),
            flow_capacity: 256,
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if it exists; defaults otherwise, with a warning when the
    /// file is present but unusable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "no editor config, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded editor config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "falling back to default editor config");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.drag_activation_distance.is_finite() || self.drag_activation_distance < 0.0 {
            return Err(ConfigError::Invalid {
                key: "drag_activation_distance",
                reason: format!("{} is not a non-negative distance", self.drag_activation_distance),
            });
        }
        if self.flow_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "flow_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn preview_debounce(&self) -> Duration {
        Duration::from_millis(self.preview_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.save_debounce(), Duration::from_millis(300));
        assert_eq!(config.preview_debounce(), Duration::from_millis(150));
        assert!(config.auto_refresh_preview);
        assert_eq!(config.auto_revision_summary, "Auto-saved changes");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EditorConfig::from_toml_str("save_debounce_ms = 50\nattribution = \"ada\"\n").unwrap();
        assert_eq!(config.save_debounce_ms, 50);
        assert_eq!(config.attribution, "ada");
        assert_eq!(config.preview_debounce_ms, 150);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EditorConfig::from_toml_str("flow_capacity = 0"),
            Err(ConfigError::Invalid { key: "flow_capacity", .. })
        ));
        assert!(matches!(
            EditorConfig::from_toml_str("save_debounce_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auto_refresh_preview = false").unwrap();
        let config = EditorConfig::load(file.path()).unwrap();
        assert!(!config.auto_refresh_preview);

        let missing = file.path().with_extension("missing");
        assert_eq!(EditorConfig::load_or_default(&missing), EditorConfig::default());
    }
}
