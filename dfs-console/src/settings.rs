//! Console settings

use std::path::{Path, PathBuf};

use dfs_nol::NolConfig;
use dfs_sim::{default_5ghz_plan, ChannelSpec};
use serde::{Deserialize, Serialize};

/// One scripted radar detection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RadarEvent {
    /// Offset from the start of the run, in milliseconds
    pub at_ms: u64,
    /// Channel the radar was seen on, in MHz
    pub frequency: u32,
}

/// Console settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// NOL manager configuration
    #[serde(default)]
    pub nol: NolConfig,
    /// Channel plan of the simulated stack
    #[serde(default = "default_5ghz_plan")]
    pub channels: Vec<ChannelSpec>,
    /// Channel the access points start on
    #[serde(default)]
    pub operating_channel: Option<u32>,
    /// Radar detections to replay
    #[serde(default)]
    pub scenario: Vec<RadarEvent>,
    /// How long to run before saving state and exiting
    pub run_for_ms: u64,
    /// Where the NOL is persisted between runs
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nol: NolConfig::default(),
            channels: default_5ghz_plan(),
            operating_channel: Some(5260),
            scenario: vec![
                RadarEvent {
                    at_ms: 1_000,
                    frequency: 5260,
                },
                RadarEvent {
                    at_ms: 2_500,
                    frequency: 5500,
                },
            ],
            run_for_ms: 5_000,
            state_file: Self::config_dir().map(|p| p.join("nol_state.json")),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for dfs-nol
    /// Uses $XDG_CONFIG_HOME/dfs-nol, falls back to ~/.config/dfs-nol
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("dfs-nol"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("dfs-nol"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from `path`
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&json)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    /// Load settings from `path`, writing the defaults there on first run
    pub fn load_or_create(path: &Path) -> Result<Self, String> {
        if path.exists() {
            return Self::load_from(path);
        }
        let settings = Self::default();
        settings.save_to(path)?;
        tracing::info!(path = %path.display(), "Wrote default settings");
        Ok(settings)
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))
    }

    /// Scenario events in the order they happen
    pub fn sorted_scenario(&self) -> Vec<RadarEvent> {
        let mut events = self.scenario.clone();
        events.sort_by_key(|e| e.at_ms);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"run_for_ms": 100}"#).unwrap();
        assert_eq!(settings.run_for_ms, 100);
        assert_eq!(settings.nol, NolConfig::default());
        assert_eq!(settings.channels.len(), 19);
        assert!(settings.scenario.is_empty());
        assert_eq!(settings.state_file, None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("dfs-console-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let settings = Settings {
            operating_channel: Some(5500),
            state_file: None,
            ..Default::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("dfs-console-first-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = std::fs::remove_dir_all(&dir);

        let created = Settings::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(Settings::load_or_create(&path).unwrap(), created);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = std::env::temp_dir().join(format!("dfs-console-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_scenario_is_sorted() {
        let settings = Settings {
            scenario: vec![
                RadarEvent {
                    at_ms: 900,
                    frequency: 5280,
                },
                RadarEvent {
                    at_ms: 100,
                    frequency: 5260,
                },
            ],
            ..Default::default()
        };
        let order: Vec<u32> = settings
            .sorted_scenario()
            .iter()
            .map(|e| e.frequency)
            .collect();
        assert_eq!(order, vec![5260, 5280]);
    }
}
