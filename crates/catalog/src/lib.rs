pub mod db;
pub mod import;
pub mod schema;
pub mod services;

use std::fs;
use std::path::{Path, PathBuf};

use app_settings::AppSettings;
use engine::{ensure_thumbnail_dir, EngineConfig, MediaEngine};
use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

use crate::db::CatalogDb;
use crate::import::{ImportOptions, ImportReport};
use crate::schema::{schema_version, TARGET_SCHEMA_VERSION};
use crate::services::CatalogService;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] app_settings::AppSettingsError),

    #[error("Unsupported catalog version: {0}")]
    UnsupportedVersion(i64),

    #[error("cannot create thumbnail directory {path}: {source}")]
    ThumbnailDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone)]
pub struct CatalogPath(PathBuf);

impl CatalogPath {
    /// Paths without a `.sqlite`/`.db` extension get `.sqlite` appended.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let mut normalized = path.as_ref().to_path_buf();
        if normalized
            .extension()
            .and_then(|s| s.to_str())
            .filter(|ext| ext.eq_ignore_ascii_case("sqlite") || ext.eq_ignore_ascii_case("db"))
            .is_none()
        {
            normalized.set_extension("sqlite");
        }
        Self(normalized)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> PathBuf {
        self.0
    }
}

/// Builds the engine configuration described by `settings`.
pub fn engine_config(settings: &AppSettings) -> Result<EngineConfig> {
    let mut config = EngineConfig::new(settings.resolved_thumbnail_dir()?);
    config.thumbnail_size = settings.thumbnail_size;
    config.ffprobe = settings.resolved_ffprobe();
    config.ffmpeg = settings.resolved_ffmpeg();
    config.process_timeout = settings.process_timeout();
    Ok(config)
}

/// An open catalog: the store plus the engine that feeds it.
pub struct Catalog {
    service: CatalogService,
    engine: MediaEngine,
    path: PathBuf,
    import_workers: Option<usize>,
}

impl Catalog {
    /// Opens (creating when needed) the catalog and thumbnail directory named by `settings`.
    pub fn open(settings: &AppSettings) -> Result<Self> {
        let mut catalog = Self::open_at(settings.resolved_catalog_path()?, engine_config(settings)?)?;
        catalog.import_workers = settings.import_workers;
        Ok(catalog)
    }

    /// Failing to open the store or to create the thumbnail directory is fatal.
    pub fn open_at(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let path = CatalogPath::new(path).into_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        let version = schema_version(&conn)?;
        if version > TARGET_SCHEMA_VERSION {
            return Err(CatalogError::UnsupportedVersion(version));
        }
        let db = CatalogDb::from_connection(conn)?;

        ensure_thumbnail_dir(&config.thumbnail_dir).map_err(|source| {
            CatalogError::ThumbnailDir {
                path: config.thumbnail_dir.clone(),
                source,
            }
        })?;

        info!(
            "opened catalog {} (thumbnails in {})",
            path.display(),
            config.thumbnail_dir.display()
        );
        Ok(Self {
            service: CatalogService::new(db),
            engine: MediaEngine::new(config),
            path,
            import_workers: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn service(&self) -> &CatalogService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut CatalogService {
        &mut self.service
    }

    pub fn engine(&self) -> &MediaEngine {
        &self.engine
    }

    pub fn import_directory(&mut self, dir: &Path) -> Result<ImportReport> {
        let options = ImportOptions {
            workers: self.import_workers,
            ..ImportOptions::default()
        };
        self.import_directory_with_options(dir, &options)
    }

    pub fn import_directory_with_options(
        &mut self,
        dir: &Path,
        options: &ImportOptions,
    ) -> Result<ImportReport> {
        Ok(import::import_directory_with_options(
            &mut self.service,
            &self.engine,
            dir,
            options,
        )?)
    }
}
