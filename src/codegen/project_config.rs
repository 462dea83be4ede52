//! Settings schema for `atomgen.yaml`
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use crate::codegen::output_path::DEFAULT_CONTENT_ROOT_MARKER;
use crate::error::{AtomicError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file name looked up by the CLI
pub const SETTINGS_FILE_NAME: &str = "atomgen.yaml";

/// Generator settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtomicSettings {
    /// Regenerate on content changes
    pub auto_generate_enabled: bool,
    /// Surface auto-mode failures as notifications
    pub show_notifications: bool,
    pub debounce_delay_ms: u64,
    /// Minimum time between two completed generations of the same file
    pub min_generation_spacing_ms: u64,
    /// Budget for a single type-oracle query during validation
    pub oracle_timeout_ms: u64,
    pub write_retry_delay_ms: u64,
    /// Delete the generated file when its `.atomic` source goes away
    pub delete_on_source_removal: bool,
    pub content_root_marker: String,
    /// Where the generated-file tracker persists its state
    pub tracker_file: Option<PathBuf>,
}

impl Default for AtomicSettings {
    fn default() -> Self {
        Self {
            auto_generate_enabled: true,
            show_notifications: true,
            debounce_delay_ms: 500,
            min_generation_spacing_ms: 500,
            oracle_timeout_ms: 50,
            write_retry_delay_ms: 100,
            delete_on_source_removal: true,
            content_root_marker: DEFAULT_CONTENT_ROOT_MARKER.to_string(),
            tracker_file: None,
        }
    }
}

impl AtomicSettings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AtomicError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let settings = Self::from_yaml(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from YAML text; an empty document yields defaults
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
            .map_err(|e| AtomicError::config(format!("Failed to parse settings: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.content_root_marker.trim().is_empty() {
            return Err(AtomicError::config("contentRootMarker must not be empty"));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(AtomicError::config("oracleTimeoutMs must be greater than zero"));
        }
        Ok(())
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn min_generation_spacing(&self) -> Duration {
        Duration::from_millis(self.min_generation_spacing_ms)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = AtomicSettings::default();
        assert!(settings.auto_generate_enabled);
        assert!(settings.show_notifications);
        assert_eq!(settings.debounce_delay(), Duration::from_millis(500));
        assert_eq!(settings.content_root_marker, "Assets");
        assert_eq!(settings.tracker_file, None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = AtomicSettings::from_yaml(
            "autoGenerateEnabled: false\ndebounceDelayMs: 250\ntrackerFile: .atomgen/tracker.json\n",
        )
        .unwrap();

        assert!(!settings.auto_generate_enabled);
        assert_eq!(settings.debounce_delay_ms, 250);
        assert_eq!(settings.tracker_file, Some(PathBuf::from(".atomgen/tracker.json")));
        assert_eq!(settings.min_generation_spacing_ms, 500);
        assert!(settings.delete_on_source_removal);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "showNotifications: false").unwrap();
        writeln!(file, "contentRootMarker: Content").unwrap();

        let settings = AtomicSettings::from_file(file.path()).unwrap();
        assert!(!settings.show_notifications);
        assert_eq!(settings.content_root_marker, "Content");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(AtomicSettings::from_yaml("debounceDelayMs: soon").is_err());

        let settings = AtomicSettings::from_yaml("contentRootMarker: \"\"").unwrap();
        assert!(settings.validate().unwrap_err().is_configuration());
    }
}
