use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use core_types::{MediaKind, MediaMetadata, Orientation};
use exif::{In, Reader, Value as ExifValue};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use tracing::debug;

use crate::backend::MediaBackend;
use crate::thumbnail::{apply_orientation, fit_within, ReservedThumbnail};
use crate::{timestamp, EngineError, Result};

const TIMESTAMP_TAGS: [&str; 3] = ["DateTimeOriginal", "DateTimeDigitized", "DateTime"];

/// One primary-IFD EXIF value, reduced to what the catalog consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Other(String),
}

/// Primary-IFD EXIF tags keyed by their symbolic name, or by the decimal tag
/// number when the tag has no known name.
#[derive(Debug, Default)]
pub struct ExifTags {
    values: HashMap<String, TagValue>,
}

impl ExifTags {
    /// Returns an empty set when the file carries no readable EXIF.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => Ok(Self::from_exif(&exif)),
            Err(err) => {
                debug!("no EXIF in {}: {err}", path.display());
                Ok(Self::default())
            }
        }
    }

    fn from_exif(exif: &exif::Exif) -> Self {
        let values = exif
            .fields()
            .filter(|field| field.ifd_num == In::PRIMARY)
            .map(|field| {
                let key = if field.tag.description().is_some() {
                    field.tag.to_string()
                } else {
                    field.tag.number().to_string()
                };
                let value = match &field.value {
                    ExifValue::Ascii(parts) => TagValue::Text(scrub(parts)),
                    other => match int_value(other) {
                        Some(number) => TagValue::Integer(number),
                        None => TagValue::Other(field.display_value().to_string()),
                    },
                };
                (key, value)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.values.get(key)
    }

    /// Non-empty text value for `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            TagValue::Text(text) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            TagValue::Integer(number) => Some(*number),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Joins the NUL-separated ASCII components, dropping the NULs, and trims.
fn scrub(parts: &[Vec<u8>]) -> String {
    let joined: String = parts
        .iter()
        .map(|raw| String::from_utf8_lossy(raw))
        .collect();
    joined.replace('\u{0}', "").trim().to_string()
}

fn int_value(value: &ExifValue) -> Option<i64> {
    match value {
        ExifValue::Byte(values) => values.first().map(|v| i64::from(*v)),
        ExifValue::Short(values) => values.first().map(|v| i64::from(*v)),
        ExifValue::Long(values) => values.first().map(|v| i64::from(*v)),
        ExifValue::SByte(values) => values.first().map(|v| i64::from(*v)),
        ExifValue::SShort(values) => values.first().map(|v| i64::from(*v)),
        ExifValue::SLong(values) => values.first().map(|v| i64::from(*v)),
        _ => None,
    }
}

/// Still images decoded in-process.
#[derive(Debug, Clone)]
pub struct ImageBackend {
    max_edge: u32,
}

impl ImageBackend {
    pub fn new(max_edge: u32) -> Self {
        Self { max_edge }
    }

    /// Decode, orient and downscale `path` for its thumbnail.
    pub fn render(&self, path: &Path, orientation: Option<Orientation>) -> Result<DynamicImage> {
        let oriented = apply_orientation(decode(path)?, orientation);
        let (width, height) = fit_within(oriented.width(), oriented.height(), self.max_edge);
        if (width, height) == (oriented.width(), oriented.height()) {
            return Ok(oriented);
        }
        Ok(oriented.resize_exact(width, height, FilterType::Lanczos3))
    }
}

impl MediaBackend for ImageBackend {
    fn extract_metadata(&self, path: &Path) -> Result<MediaMetadata> {
        let (decoded_width, decoded_height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()?;
        let tags = ExifTags::read(path)?;

        let mut metadata = MediaMetadata::empty(MediaKind::Image);
        metadata.width = tags
            .integer("PixelXDimension")
            .or_else(|| tags.integer("ImageWidth"))
            .unwrap_or_else(|| i64::from(decoded_width));
        metadata.height = tags
            .integer("PixelYDimension")
            .or_else(|| tags.integer("ImageLength"))
            .unwrap_or_else(|| i64::from(decoded_height));
        if let Some(orientation) = tags.integer("Orientation") {
            metadata.orientation = orientation;
        }
        if let Some(make) = tags.text("Make") {
            metadata.make = make.to_string();
        }
        if let Some(model) = tags.text("Model") {
            metadata.model = model.to_string();
        }
        metadata.timestamp = TIMESTAMP_TAGS
            .iter()
            .filter_map(|key| tags.text(key))
            .find_map(timestamp::parse_exif_datetime);

        debug!(
            "{}: {}x{} orientation {} ({} EXIF tags)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.orientation,
            tags.len()
        );
        Ok(metadata)
    }

    fn render_thumbnail(
        &self,
        path: &Path,
        metadata: &MediaMetadata,
        target: &mut ReservedThumbnail,
    ) -> Result<()> {
        let thumbnail = self.render(path, metadata.orientation())?;
        target.write_image(&thumbnail)
    }
}

fn decode(path: &Path) -> Result<DynamicImage> {
    let attempt = catch_unwind(AssertUnwindSafe(|| -> Result<DynamicImage> {
        Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
    }));
    match attempt {
        Ok(result) => result,
        Err(_) => Err(EngineError::Unsupported(format!(
            "decoder panicked on {}",
            path.display()
        ))),
    }
}
