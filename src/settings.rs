use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::translation::{DEFAULT_API_BASE, DEFAULT_MODEL};

const APP_DIR_NAME: &str = "live-translator";
const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Locale the source side starts in.
    pub source_language: String,

    /// Locale the target side starts in.
    pub target_language: String,

    /// Text-generation model used for translation.
    pub model: String,

    /// Base URL of the Generative Language API (without the `/models/...` suffix).
    pub api_base_url: String,

    /// Speech synthesis rate, 1.0 is the engine's normal speed.
    pub speech_rate: f32,

    /// Speech synthesis pitch, 1.0 is the engine's normal pitch.
    pub speech_pitch: f32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            source_language: "en-US".to_string(),
            target_language: "es-ES".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            speech_rate: 1.0,
            speech_pitch: 1.0,
        }
    }
}

impl AppSettings {
    /// Apply `TRANSLATOR_MODEL` / `TRANSLATOR_API_BASE` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("TRANSLATOR_MODEL") {
            if !model.is_empty() {
                self.model = model;
            }
        }
        if let Ok(base) = std::env::var("TRANSLATOR_API_BASE") {
            if !base.is_empty() {
                self.api_base_url = base;
            }
        }
        self
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

/// Load settings from the user config directory, falling back to defaults.
pub fn load_settings() -> AppSettings {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            log::warn!("Settings: could not determine config directory");
            AppSettings::default()
        }
    }
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => {
                log::info!("Settings: loaded {:?}", path);
                settings
            }
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                AppSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"target_language": "fr-FR", "speech_rate": 1.25}}"#).unwrap();

        let settings = load_settings_from(file.path());
        assert_eq!(settings.source_language, "en-US");
        assert_eq!(settings.target_language, "fr-FR");
        assert_eq!(settings.speech_rate, 1.25);
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert_eq!(load_settings_from(file.path()), AppSettings::default());
    }
}
