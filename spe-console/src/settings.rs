//! Application settings
//!
//! Settings are read from a JSON file and never written back. A missing
//! file at the default location means defaults; an explicitly requested
//! file must exist.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use spe_link::LinkConfig;
use spe_sim::VirtualAmplifierConfig;

use crate::error::ConsoleError;

/// Default bridge host name
pub const DEFAULT_HOST: &str = "usb.local";

/// Default bridge TCP port
pub const DEFAULT_PORT: u16 = 50000;

/// Application settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Host running the serial-to-TCP bridge
    pub host: String,
    /// Bridge TCP port
    pub port: u16,
    /// Poll, watchdog and event settings
    #[serde(flatten)]
    pub link: LinkConfig,
    /// Serial port used by `power-on`
    pub serial_port: Option<String>,
    /// Virtual amplifier used with `--simulate`
    pub simulation: VirtualAmplifierConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            link: LinkConfig::default(),
            serial_port: None,
            simulation: VirtualAmplifierConfig::default(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for spe-control
    /// Uses $XDG_CONFIG_HOME/spe-control, falls back to ~/.config/spe-control
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("spe-control"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("spe-control"))
    }

    /// Default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Result<Self, ConsoleError> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::settings_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self, ConsoleError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConsoleError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConsoleError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// `host:port` of the bridge
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spe_link::PollPolicy;
    use spe_protocol::AmpModel;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.address(), "usb.local:50000");
        assert_eq!(settings.link.poll_interval_ms, 500);
        assert_eq!(settings.link.poll_policy, PollPolicy::ScreenOnly);
    }

    #[test]
    fn test_flat_link_fields() {
        let settings = Settings::from_json(
            r#"{
                "host": "192.168.1.40",
                "poll_interval_ms": 250,
                "watchdog_ticks": 20,
                "poll_policy": "alternate",
                "serial_port": "/dev/ttyUSB0",
                "simulation": { "model": "Expert2K" }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.address(), "192.168.1.40:50000");
        assert_eq!(settings.link.poll_interval_ms, 250);
        assert_eq!(settings.link.watchdog_ticks, 20);
        assert_eq!(settings.link.poll_policy, PollPolicy::Alternate);
        assert_eq!(settings.serial_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(settings.simulation.model, AmpModel::Expert2K);
        assert_eq!(settings.simulation.band, 5);
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(Settings::from_json(r#"{ "port": "fifty" }"#).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/spe-control.json"))).unwrap_err();
        assert!(matches!(err, ConsoleError::SettingsRead { .. }));
    }
}
