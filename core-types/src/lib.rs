use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored in place of a width/height/orientation that could not be determined.
pub const UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Maps a MIME top-level type (`image`, `video`) to a media kind.
    pub fn from_mime_type(top_level: &str) -> Option<Self> {
        match top_level {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// EXIF orientation codes (tag 0x0112).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }
}

/// Normalized metadata for one source file.
///
/// Absent values use the catalog sentinels: [`UNKNOWN`] for numeric fields,
/// an empty string for make/model and `None` for the capture timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub kind: MediaKind,
    pub width: i64,
    pub height: i64,
    pub orientation: i64,
    pub make: String,
    pub model: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Clip length in seconds. Only probed for video and never persisted.
    pub duration: Option<f64>,
}

impl MediaMetadata {
    pub fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            width: UNKNOWN,
            height: UNKNOWN,
            orientation: UNKNOWN,
            make: String::new(),
            model: String::new(),
            timestamp: None,
            duration: None,
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        Orientation::from_code(self.orientation)
    }

    /// Width and height when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let width = u32::try_from(self.width).ok().filter(|w| *w > 0)?;
        let height = u32::try_from(self.height).ok().filter(|h| *h > 0)?;
        Some((width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_codes_are_stable() {
        for code in 1..=8 {
            let orientation = Orientation::from_code(code).unwrap();
            assert_eq!(orientation.code(), code);
        }
        assert_eq!(Orientation::from_code(UNKNOWN), None);
        assert_eq!(Orientation::from_code(9), None);
    }

    #[test]
    fn empty_metadata_uses_sentinels() {
        let meta = MediaMetadata::empty(MediaKind::Image);
        assert_eq!(meta.width, UNKNOWN);
        assert_eq!(meta.orientation, UNKNOWN);
        assert!(meta.make.is_empty());
        assert_eq!(meta.dimensions(), None);
        assert_eq!(meta.orientation(), None);
    }

    #[test]
    fn media_kind_from_top_level_type() {
        assert_eq!(MediaKind::from_mime_type("image"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime_type("video"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime_type("audio"), None);
    }
}
