//! Startup configuration: `settings.json` in the per-user config dir, overridden by CLI flags.
//!
//! The file is only ever read. Interval changes made in the window live for the
//! process lifetime and are not written back.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::repository::{DEFAULT_WALLPAPERS_FOLDER, PictureRepository};

/// File name used under the per-user config directory.
const SETTINGS_FILE: &str = "settings.json";

/// Settings read from `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// Overrides the OS pictures directory.
    pub pictures_root: Option<PathBuf>,
    /// Folder under the pictures root that holds wallpapers.
    pub wallpapers_folder: String,
    /// Rotation interval applied at startup, in seconds.
    pub interval_secs: Option<i64>,
    /// Per-download HTTP timeout.
    pub download_timeout_secs: u64,
    /// User agent sent with download requests.
    pub user_agent: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            pictures_root: None,
            wallpapers_folder: DEFAULT_WALLPAPERS_FOLDER.to_string(),
            interval_secs: None,
            download_timeout_secs: 60,
            user_agent: concat!("wallpaper_rotator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AppSettings {
    /// Build the picture repository these settings point at.
    pub fn repository(&self) -> PictureRepository {
        match &self.pictures_root {
            Some(root) => PictureRepository::new(root.clone(), self.wallpapers_folder.clone()),
            None => PictureRepository::from_os(self.wallpapers_folder.clone()),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "wallpaper_rotator", "wallpaper_rotator")
        .ok_or_else(|| anyhow!("cannot determine project directories"))
}

/// Default location of `settings.json`.
pub fn settings_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(SETTINGS_FILE))
}

/// Per-user cache directory, created on demand.
pub fn cache_dir() -> Result<PathBuf> {
    let dirs = project_dirs()?;
    let cache_dir = dirs.cache_dir();
    fs::create_dir_all(cache_dir)?;
    Ok(cache_dir.to_path_buf())
}

/// Load settings from the default location, returning defaults when missing.
pub fn load() -> AppSettings {
    match settings_path() {
        Ok(path) => load_from(&path),
        Err(_) => AppSettings::default(),
    }
}

/// Load settings from `path`; missing or malformed files yield defaults.
pub fn load_from(path: &Path) -> AppSettings {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return AppSettings::default(),
    };
    match serde_json::from_str(&contents) {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("ignoring malformed {}: {err}", path.display());
            AppSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_from(&dir.path().join("settings.json"));
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.wallpapers_folder, "Wallpapers");
        assert_eq!(settings.interval_secs, None);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "interval_secs": 30, "wallpapers_folder": "wallpapers" }"#).unwrap();

        let settings = load_from(&path);
        assert_eq!(settings.interval_secs, Some(30));
        assert_eq!(settings.wallpapers_folder, "wallpapers");
        assert_eq!(settings.download_timeout_secs, 60);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_from(&path), AppSettings::default());
    }

    #[test]
    fn pictures_root_override_reaches_repository() {
        let settings = AppSettings {
            pictures_root: Some("/srv/pics".into()),
            ..AppSettings::default()
        };
        let repo = settings.repository();
        assert_eq!(repo.pictures_root(), Path::new("/srv/pics"));
        assert_eq!(
            repo.wallpapers_dir(),
            PathBuf::from("/srv/pics").join("Wallpapers")
        );
    }
}
