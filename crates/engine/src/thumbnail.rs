use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use core_types::Orientation;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use rand::Rng;
use tracing::{debug, warn};

use crate::{EngineError, Result};

pub const THUMBNAIL_EXTENSION: &str = "jpg";
pub const THUMBNAIL_ID_LEN: usize = 16;
pub const DEFAULT_MAX_EDGE: u32 = 256;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_NAME_ATTEMPTS: usize = 8;
const JPEG_QUALITY: u8 = 85;

/// Draw a fresh 16-character identifier from `[a-z0-9]`.
pub fn new_thumbnail_id() -> String {
    let mut rng = rand::thread_rng();
    (0..THUMBNAIL_ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

pub fn thumbnail_file_name(id: &str) -> String {
    format!("{id}.{THUMBNAIL_EXTENSION}")
}

/// Create the thumbnail directory (and parents) when missing, `rwxr-xr-x` on Unix.
pub fn ensure_thumbnail_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

/// Scale `(width, height)` so the longer edge is at most `max_edge`, keeping
/// the aspect ratio. Never upscales.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer == 0 || longer <= max_edge {
        return (width.max(1), height.max(1));
    }

    let scale = |edge: u32| -> u32 {
        let scaled = (u64::from(edge) * u64::from(max_edge) + u64::from(longer) / 2)
            / u64::from(longer);
        scaled.max(1) as u32
    };

    if width >= height {
        (max_edge, scale(height))
    } else {
        (scale(width), max_edge)
    }
}

/// Rotate/flip `img` so it displays upright for the given EXIF orientation.
pub fn apply_orientation(mut img: DynamicImage, orientation: Option<Orientation>) -> DynamicImage {
    let exif = orientation
        .and_then(|o| u8::try_from(o.code()).ok())
        .and_then(image::metadata::Orientation::from_exif);
    if let Some(exif) = exif {
        img.apply_orientation(exif);
    }
    img
}

/// A thumbnail file that has been created empty under a unique name.
#[derive(Debug)]
pub struct ReservedThumbnail {
    id: String,
    path: PathBuf,
    file: File,
}

impl ReservedThumbnail {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode `image` into the reserved file as JPEG.
    pub fn write_image(&mut self, image: &DynamicImage) -> Result<()> {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut writer = BufWriter::new(&self.file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        rgb.write_with_encoder(encoder)?;
        writer.flush()?;
        Ok(())
    }

    fn discard(self) {
        let Self { path, file, .. } = self;
        drop(file);
        if let Err(err) = fs::remove_file(&path) {
            warn!("failed to remove partial thumbnail {}: {err}", path.display());
        }
    }
}

/// The directory holding one `<id>.jpg` per cataloged medium.
#[derive(Debug, Clone)]
pub struct ThumbnailStore {
    dir: PathBuf,
}

impl ThumbnailStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(thumbnail_file_name(id))
    }

    /// Deletes the thumbnail for `id`; a missing file is not an error.
    pub fn remove(&self, id: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Reserve a unique name, let `render` fill the file and return the id.
    /// A failed render leaves nothing behind.
    pub fn create<F>(&self, render: F) -> Result<String>
    where
        F: FnOnce(&mut ReservedThumbnail) -> Result<()>,
    {
        let mut reserved = self.reserve_with(new_thumbnail_id)?;
        match render(&mut reserved) {
            Ok(()) => {
                debug!("wrote thumbnail {}", reserved.path.display());
                Ok(reserved.id)
            }
            Err(err) => {
                reserved.discard();
                Err(err)
            }
        }
    }

    /// Names are claimed with `create_new`, so an existing file is never
    /// overwritten; on collision another id is drawn.
    fn reserve_with<G>(&self, mut next_id: G) -> Result<ReservedThumbnail>
    where
        G: FnMut() -> String,
    {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let id = next_id();
            let path = self.path_for(&id);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok(ReservedThumbnail { id, path, file }),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    warn!("thumbnail id {id} already taken, drawing another");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::NamesExhausted(MAX_NAME_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn ids_are_sixteen_lowercase_alphanumerics() {
        let id = new_thumbnail_id();
        assert_eq!(id.len(), THUMBNAIL_ID_LEN);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(id, new_thumbnail_id());
        assert_eq!(thumbnail_file_name("abc"), "abc.jpg");
    }

    #[test]
    fn fit_within_caps_the_longer_edge() {
        assert_eq!(fit_within(1024, 512, 256), (256, 128));
        assert_eq!(fit_within(600, 1800, 256), (85, 256));
        assert_eq!(fit_within(300, 300, 256), (256, 256));
        assert_eq!(fit_within(100, 40, 256), (100, 40));
        assert_eq!(fit_within(10_000, 1, 256), (256, 1));
    }

    #[test]
    fn orientation_swaps_dimensions_for_quarter_turns() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let img = DynamicImage::ImageRgb8(img);

        let rotated = apply_orientation(img.clone(), Some(Orientation::Rotate90));
        assert_eq!((rotated.width(), rotated.height()), (2, 4));
        // top-left moves to top-right under a clockwise quarter turn
        assert_eq!(rotated.to_rgb8().get_pixel(1, 0), &Rgb([255, 0, 0]));

        let transposed = apply_orientation(img.clone(), Some(Orientation::Transpose));
        assert_eq!(transposed.to_rgb8().get_pixel(0, 0), &Rgb([255, 0, 0]));

        let flipped = apply_orientation(img.clone(), Some(Orientation::FlipHorizontal));
        assert_eq!((flipped.width(), flipped.height()), (4, 2));
        assert_eq!(flipped.to_rgb8().get_pixel(3, 0), &Rgb([255, 0, 0]));

        let untouched = apply_orientation(img, None);
        assert_eq!((untouched.width(), untouched.height()), (4, 2));
    }

    #[test]
    fn create_writes_one_jpeg_named_by_id() {
        let dir = tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));

        let id = store.create(|target| target.write_image(&img)).unwrap();
        let path = store.path_for(&id);
        assert!(path.exists());
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_render_leaves_no_file() {
        let dir = tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let err = store
            .create(|_| Err(EngineError::Unsupported("nope".into())))
            .unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn removing_a_thumbnail_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        let id = store
            .create(|target| target.write_image(&DynamicImage::new_rgb8(2, 2)))
            .unwrap();
        assert!(store.path_for(&id).exists());

        store.remove(&id).unwrap();
        assert!(!store.path_for(&id).exists());
        store.remove(&id).unwrap();
    }

    #[test]
    fn collisions_draw_a_new_id() {
        let dir = tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        fs::write(store.path_for("aaaaaaaaaaaaaaaa"), b"taken").unwrap();

        let mut ids = vec!["bbbbbbbbbbbbbbbb", "aaaaaaaaaaaaaaaa"];
        let reserved = store
            .reserve_with(|| ids.pop().unwrap().to_string())
            .unwrap();
        assert_eq!(reserved.id(), "bbbbbbbbbbbbbbbb");
        assert_eq!(fs::read(store.path_for("aaaaaaaaaaaaaaaa")).unwrap(), b"taken");
    }

    #[test]
    fn exhausted_names_are_an_error() {
        let dir = tempdir().unwrap();
        let store = ThumbnailStore::new(dir.path());
        fs::write(store.path_for("cccccccccccccccc"), b"taken").unwrap();
        let err = store
            .reserve_with(|| "cccccccccccccccc".to_string())
            .unwrap_err();
        assert!(matches!(err, EngineError::NamesExhausted(_)));
    }

    #[cfg(unix)]
    #[test]
    fn thumbnail_dir_is_created_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let target = dir.path().join("a").join("thumbs");
        ensure_thumbnail_dir(&target).unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        // umask may only remove bits
        assert_eq!(mode & !0o755, 0);
        assert_eq!(mode & 0o700, 0o700);
        ensure_thumbnail_dir(&target).unwrap();
    }
}
