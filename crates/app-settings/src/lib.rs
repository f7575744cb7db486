use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppSettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings path unavailable")]
    MissingSettingsPath,
}

pub type Result<T> = std::result::Result<T, AppSettingsError>;

pub const DEFAULT_PROCESS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

const CATALOG_FILE_NAME: &str = "catalog.sqlite";
const THUMBNAIL_DIR_NAME: &str = "thumbnails";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub thumbnail_dir: Option<PathBuf>,
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(default = "default_process_timeout_secs")]
    pub process_timeout_secs: u64,
    /// Worker threads for metadata extraction and thumbnailing. `None` uses one per core.
    #[serde(default)]
    pub import_workers: Option<usize>,
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            catalog_path: None,
            thumbnail_dir: None,
            ffprobe_path: None,
            ffmpeg_path: None,
            process_timeout_secs: DEFAULT_PROCESS_TIMEOUT_SECS,
            import_workers: None,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

fn default_process_timeout_secs() -> u64 {
    DEFAULT_PROCESS_TIMEOUT_SECS
}

fn default_thumbnail_size() -> u32 {
    DEFAULT_THUMBNAIL_SIZE
}

impl AppSettings {
    pub fn load() -> Result<Self> {
        load_impl()
    }

    pub fn save(&self) -> Result<()> {
        save_impl(self)
    }

    /// Configured catalog file, or `catalog.sqlite` in the platform data directory.
    pub fn resolved_catalog_path(&self) -> Result<PathBuf> {
        match &self.catalog_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(CATALOG_FILE_NAME)),
        }
    }

    /// Configured thumbnail directory, or `thumbnails/` in the platform data directory.
    pub fn resolved_thumbnail_dir(&self) -> Result<PathBuf> {
        match &self.thumbnail_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join(THUMBNAIL_DIR_NAME)),
        }
    }

    pub fn resolved_ffprobe(&self) -> PathBuf {
        self.ffprobe_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffprobe"))
    }

    pub fn resolved_ffmpeg(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_secs(self.process_timeout_secs.max(1))
    }

    pub fn set_catalog_path(&mut self, path: PathBuf) {
        self.catalog_path = Some(path);
    }

    pub fn set_thumbnail_dir(&mut self, path: PathBuf) {
        self.thumbnail_dir = Some(path);
    }
}

fn data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "Medieval", "Medieval")
        .ok_or(AppSettingsError::MissingSettingsPath)?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

#[cfg(target_os = "windows")]
fn load_impl() -> Result<AppSettings> {
    use winreg::enums::{HKEY_CURRENT_USER, KEY_READ};
    use winreg::RegKey;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let key = hkcu
        .open_subkey_with_flags("Software\\Medieval", KEY_READ)
        .ok();

    if let Some(key) = key {
        if let Ok(payload) = key.get_value::<String, _>("AppSettings") {
            return Ok(serde_json::from_str(&payload)?);
        }
    }

    Ok(AppSettings::default())
}

#[cfg(target_os = "windows")]
fn save_impl(settings: &AppSettings) -> Result<()> {
    use winreg::enums::{HKEY_CURRENT_USER, KEY_WRITE};
    use winreg::RegKey;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _) = hkcu.create_subkey_with_flags("Software\\Medieval", KEY_WRITE)?;
    let payload = serde_json::to_string(settings)?;
    key.set_value("AppSettings", &payload)?;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn load_impl() -> Result<AppSettings> {
    let path = settings_file_path()?;
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: AppSettings = serde_json::from_str(&content)?;
        Ok(settings)
    } else {
        Ok(AppSettings::default())
    }
}

#[cfg(not(target_os = "windows"))]
fn save_impl(settings: &AppSettings) -> Result<()> {
    let path = settings_file_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let payload = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, payload)?;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn settings_file_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "Medieval", "Medieval")
        .ok_or(AppSettingsError::MissingSettingsPath)?;
    let mut path = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&path)?;
    path.push("settings.json");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"catalog_path": "/tmp/medieval.sqlite"}"#).unwrap();
        assert_eq!(
            settings.catalog_path.as_deref(),
            Some(std::path::Path::new("/tmp/medieval.sqlite"))
        );
        assert_eq!(settings.process_timeout_secs, DEFAULT_PROCESS_TIMEOUT_SECS);
        assert_eq!(settings.thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
        assert!(settings.import_workers.is_none());
    }

    #[test]
    fn explicit_paths_win_over_platform_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = AppSettings::default();
        settings.set_catalog_path(dir.path().join("c.sqlite"));
        settings.set_thumbnail_dir(dir.path().join("thumbs"));

        assert_eq!(
            settings.resolved_catalog_path().unwrap(),
            dir.path().join("c.sqlite")
        );
        assert_eq!(
            settings.resolved_thumbnail_dir().unwrap(),
            dir.path().join("thumbs")
        );
        assert_eq!(settings.resolved_ffprobe(), PathBuf::from("ffprobe"));
    }

    #[test]
    fn process_timeout_is_never_zero() {
        let settings = AppSettings {
            process_timeout_secs: 0,
            ..AppSettings::default()
        };
        assert_eq!(settings.process_timeout(), Duration::from_secs(1));
    }
}
