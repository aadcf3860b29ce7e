//! Librarian configuration schema and loader
//!
//! Configuration is stored as YAML. Default location:
//! ~/.config/patchrack/patchrack.yaml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default detection window in milliseconds
const DEFAULT_DETECTION_WINDOW_MS: u64 = 2000;

/// Root librarian configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarianConfig {
    /// Directory holding the patch database file
    pub library_path: PathBuf,

    /// How long auto-detection waits for identity responses, in milliseconds
    pub detection_window_ms: u64,

    /// Synth model tags to probe during detection; empty means all supported
    pub enabled_models: Vec<String>,
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
            detection_window_ms: DEFAULT_DETECTION_WINDOW_MS,
            enabled_models: Vec::new(),
        }
    }
}

impl LibrarianConfig {
    pub fn detection_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.detection_window_ms)
    }
}

/// Default library directory: ~/Music/patchrack
pub fn default_library_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Music")
        .join("patchrack")
}

/// Default config file location: ~/.config/patchrack/patchrack.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchrack")
        .join("patchrack.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns the defaults. If the file exists but
/// is invalid, logs a warning and returns the defaults.
pub fn load_config(path: &Path) -> LibrarianConfig {
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return LibrarianConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<LibrarianConfig>(&contents) {
            Ok(config) => {
                log::info!(
                    "load_config: library at {:?}, detection window {}ms",
                    config.library_path,
                    config.detection_window_ms
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: Failed to parse config: {}", e);
                LibrarianConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: Failed to read config: {}", e);
            LibrarianConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed
pub fn save_config(path: &Path, config: &LibrarianConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
library_path: /tmp/patchrack-test
detection_window_ms: 500
enabled_models:
  - rev2
"#;
        let config: LibrarianConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.library_path, PathBuf::from("/tmp/patchrack-test"));
        assert_eq!(config.detection_window_ms, 500);
        assert_eq!(config.enabled_models, vec!["rev2".to_string()]);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/patchrack.yaml"));
        assert_eq!(config.detection_window_ms, DEFAULT_DETECTION_WINDOW_MS);
        assert!(config.enabled_models.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("conf").join("patchrack.yaml");

        let mut config = LibrarianConfig::default();
        config.detection_window_ms = 1234;
        save_config(&path, &config).unwrap();

        let reloaded = load_config(&path);
        assert_eq!(reloaded.detection_window_ms, 1234);
    }
}
