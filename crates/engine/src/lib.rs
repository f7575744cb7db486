pub mod backend;
pub mod image_backend;
pub mod mime;
pub mod process;
pub mod thumbnail;
pub mod timestamp;
pub mod video_backend;

use core_types::{MediaKind, MediaMetadata};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub use backend::MediaBackend;
pub use image_backend::ImageBackend;
pub use mime::{classify, Classified};
pub use thumbnail::{ensure_thumbnail_dir, ThumbnailStore, THUMBNAIL_EXTENSION};
pub use video_backend::VideoBackend;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error("Probe output parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No free thumbnail name after {0} attempts")]
    NamesExhausted(usize),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thumbnail_dir: PathBuf,
    /// Longest edge of a generated thumbnail, in pixels.
    pub thumbnail_size: u32,
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
    /// Upper bound for any single external decoder invocation.
    pub process_timeout: Duration,
}

impl EngineConfig {
    pub fn new(thumbnail_dir: impl Into<PathBuf>) -> Self {
        Self {
            thumbnail_dir: thumbnail_dir.into(),
            thumbnail_size: thumbnail::DEFAULT_MAX_EDGE,
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
            process_timeout: Duration::from_secs(30),
        }
    }
}

/// Metadata extraction and thumbnail generation for both media families.
pub struct MediaEngine {
    images: ImageBackend,
    videos: VideoBackend,
    thumbnails: ThumbnailStore,
}

impl MediaEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            images: ImageBackend::new(config.thumbnail_size),
            videos: VideoBackend::new(
                config.ffprobe.clone(),
                config.ffmpeg.clone(),
                config.process_timeout,
                config.thumbnail_size,
            ),
            thumbnails: ThumbnailStore::new(config.thumbnail_dir),
        }
    }

    pub fn thumbnail_dir(&self) -> &Path {
        self.thumbnails.dir()
    }

    pub fn classify(&self, path: &Path) -> Option<Classified> {
        classify(path)
    }

    pub fn extract(&self, path: &Path, kind: MediaKind) -> Result<MediaMetadata> {
        debug!("extracting {} metadata from {}", kind.as_str(), path.display());
        self.backend(kind).extract_metadata(path)
    }

    /// Writes one thumbnail for `path` and returns its identifier.
    pub fn generate_thumbnail(&self, path: &Path, metadata: &MediaMetadata) -> Result<String> {
        let backend = self.backend(metadata.kind);
        self.thumbnails
            .create(|target| backend.render_thumbnail(path, metadata, target))
    }

    /// Deletes a thumbnail that will not be cataloged.
    pub fn discard_thumbnail(&self, id: &str) -> Result<()> {
        Ok(self.thumbnails.remove(id)?)
    }

    fn backend(&self, kind: MediaKind) -> &dyn MediaBackend {
        match kind {
            MediaKind::Image => &self.images,
            MediaKind::Video => &self.videos,
        }
    }
}
