use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Last values the operator used, kept between runs.
///
/// The key names are the ones existing station PCs already have on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "defaultIP", default)]
    pub host: String,
    #[serde(rename = "defaultDM", default = "Settings::default_device")]
    pub device: String,
    #[serde(rename = "defaultNFCModel", default)]
    pub nfc_model: String,
}

impl Settings {
    fn default_device() -> String {
        "T1".to_string()
    }

    /// Read the settings file. A file that does not exist yet gives defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(?path, "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// NFC model name, if one was ever entered.
    pub fn nfc_model(&self) -> Option<&str> {
        let model = self.nfc_model.trim();
        (!model.is_empty()).then_some(model)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: String::new(),
            device: Self::default_device(),
            nfc_model: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.device, "T1");
        assert_eq!(settings.nfc_model(), None);
    }

    #[test]
    fn test_reads_existing_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"defaultIP": "192.168.20.10", "defaultDM": "NFC", "defaultNFCModel": "RF-7"}"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.host, "192.168.20.10");
        assert_eq!(settings.device, "NFC");
        assert_eq!(settings.nfc_model(), Some("RF-7"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            host: "10.1.1.5".to_string(),
            device: "D2".to_string(),
            nfc_model: String::new(),
        };
        settings.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["defaultIP"], "10.1.1.5");
        assert_eq!(raw["defaultDM"], "D2");
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));
    }
}
