use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "dicom-tag-browser";
const SETTINGS_FILE: &str = "settings.toml";
const SETTINGS_PATH_ENV: &str = "DICOM_TAG_BROWSER_SETTINGS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Aligned,
    Tsv,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Longer values are cut and end in `...`; 0 keeps them whole.
    pub value_max_chars: usize,
    pub format: TableFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            value_max_chars: 80,
            format: TableFormat::Aligned,
        }
    }
}

pub fn settings_file_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(SETTINGS_PATH_ENV).filter(|path| !path.is_empty()) {
        return Some(PathBuf::from(path));
    }

    #[cfg(target_os = "windows")]
    {
        return env::var_os("APPDATA")
            .map(PathBuf::from)
            .map(|base| base.join(APP_DIR).join(SETTINGS_FILE));
    }

    #[cfg(target_os = "macos")]
    {
        return env::var_os("HOME").map(PathBuf::from).map(|home| {
            home.join("Library")
                .join("Application Support")
                .join(APP_DIR)
                .join(SETTINGS_FILE)
        });
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg).join(APP_DIR).join(SETTINGS_FILE));
        }
        env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".config").join(APP_DIR).join(SETTINGS_FILE))
    }
}

/// Missing files give defaults silently; unreadable or invalid ones are
/// logged and also give defaults.
pub fn load_settings(path: &Path) -> Settings {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
        Err(err) => {
            log::warn!("Could not read settings file {}: {err}", path.display());
            return Settings::default();
        }
    };

    match parse_settings(&text) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("Ignoring settings file {}: {err:#}", path.display());
            Settings::default()
        }
    }
}

pub fn parse_settings(text: &str) -> Result<Settings> {
    toml::from_str(text).context("Invalid settings TOML")
}

pub fn render_settings(settings: &Settings) -> Result<String> {
    toml::to_string(settings).context("Could not serialize settings")
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create settings directory {}", parent.display()))?;
    }
    let contents = render_settings(settings)?;
    fs::write(path, contents)
        .with_context(|| format!("Could not write settings file {}", path.display()))
}
