use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use core_types::{MediaKind, MediaMetadata};
use serde::Deserialize;
use tracing::debug;

use crate::backend::MediaBackend;
use crate::process::run_with_timeout;
use crate::thumbnail::{fit_within, ReservedThumbnail};
use crate::{timestamp, EngineError, Result};

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, serde_json::Value>,
}

impl ProbeFormat {
    fn creation_time(&self) -> Option<&str> {
        self.tags.get("creation_time").and_then(|value| value.as_str())
    }
}

fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    raw?.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// Build the metadata record for `path` from `ffprobe -print_format json` output.
pub fn parse_probe_output(path: &Path, json: &[u8]) -> Result<MediaMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(json)?;
    let stream = probe
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| EngineError::Probe {
            path: path.to_path_buf(),
            reason: "no video stream".to_string(),
        })?;

    let mut metadata = MediaMetadata::empty(MediaKind::Video);
    if let Some(width) = stream.width.filter(|w| *w > 0) {
        metadata.width = width;
    }
    if let Some(height) = stream.height.filter(|h| *h > 0) {
        metadata.height = height;
    }
    metadata.duration = parse_seconds(stream.duration.as_deref())
        .or_else(|| parse_seconds(probe.format.duration.as_deref()));
    metadata.timestamp = probe
        .format
        .creation_time()
        .and_then(timestamp::parse_creation_time)
        .or_else(|| timestamp::from_filename(path));

    debug!(
        "{}: {} container, {}x{}, duration {:?}",
        path.display(),
        probe.format.format_name.as_deref().unwrap_or("unknown"),
        metadata.width,
        metadata.height,
        metadata.duration
    );
    Ok(metadata)
}

/// Video clips, probed and sampled through the ffmpeg tool pair.
#[derive(Debug, Clone)]
pub struct VideoBackend {
    ffprobe: PathBuf,
    ffmpeg: PathBuf,
    timeout: Duration,
    max_edge: u32,
}

impl VideoBackend {
    pub fn new(ffprobe: PathBuf, ffmpeg: PathBuf, timeout: Duration, max_edge: u32) -> Self {
        Self {
            ffprobe,
            ffmpeg,
            timeout,
            max_edge,
        }
    }
}

impl MediaBackend for VideoBackend {
    fn extract_metadata(&self, path: &Path) -> Result<MediaMetadata> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);

        let output = run_with_timeout(command, self.timeout)?;
        if !output.status.success() {
            return Err(EngineError::Probe {
                path: path.to_path_buf(),
                reason: format!("ffprobe exited with {}", output.status),
            });
        }
        parse_probe_output(path, &output.stdout)
    }

    /// Grabs the frame at the middle of the clip.
    fn render_thumbnail(
        &self,
        path: &Path,
        metadata: &MediaMetadata,
        target: &mut ReservedThumbnail,
    ) -> Result<()> {
        let (width, height) = metadata.dimensions().ok_or_else(|| EngineError::Probe {
            path: path.to_path_buf(),
            reason: "frame size unknown".to_string(),
        })?;
        let (width, height) = fit_within(width, height, self.max_edge);
        let seek = metadata.duration.map(|secs| secs / 2.0).unwrap_or(0.0);

        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-v", "error", "-ss"])
            .arg(format!("{seek:.3}"))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-vf"])
            .arg(format!("scale={width}:{height}"))
            .args(["-f", "image2", "-update", "1", "-y"])
            .arg(target.path());

        let output = run_with_timeout(command, self.timeout)?;
        if !output.status.success() {
            return Err(EngineError::Probe {
                path: path.to_path_buf(),
                reason: format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    output.stderr_lossy()
                ),
            });
        }
        if fs::metadata(target.path())?.len() == 0 {
            return Err(EngineError::Probe {
                path: path.to_path_buf(),
                reason: "ffmpeg produced no frame".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::UNKNOWN;

    const PHONE_CLIP: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "duration": "9.98"},
            {"index": 1, "codec_type": "video", "width": 1920, "height": 1080, "duration": "10.010000"}
        ],
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "10.026000",
            "tags": {"creation_time": "2021-06-12T14:03:22.000000Z", "major_brand": "qt  "}
        }
    }"#;

    #[test]
    fn first_video_stream_supplies_dimensions() {
        let meta = parse_probe_output(Path::new("clip.mp4"), PHONE_CLIP.as_bytes()).unwrap();
        assert_eq!(meta.kind, MediaKind::Video);
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.duration, Some(10.01));
        assert_eq!(meta.orientation, UNKNOWN);
        assert_eq!(
            meta.timestamp,
            Some(Utc.with_ymd_and_hms(2021, 6, 12, 14, 3, 22).unwrap())
        );
    }

    #[test]
    fn filename_is_used_when_the_container_has_no_creation_time() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480}],
            "format": {"duration": "4.5", "tags": {"encoder": "Lavf58"}}
        }"#;
        let meta =
            parse_probe_output(Path::new("/v/VID_20190505_101112.mp4"), json.as_bytes()).unwrap();
        assert_eq!(meta.duration, Some(4.5));
        assert_eq!(
            meta.timestamp,
            Some(Utc.with_ymd_and_hms(2019, 5, 5, 10, 11, 12).unwrap())
        );
    }

    #[test]
    fn unparsable_creation_time_falls_through() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 480}],
            "format": {"tags": {"creation_time": "sometime"}}
        }"#;
        let meta = parse_probe_output(Path::new("20200101.mov"), json.as_bytes()).unwrap();
        assert_eq!(
            meta.timestamp,
            Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(meta.duration, None);
    }

    #[test]
    fn containers_without_video_are_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let err = parse_probe_output(Path::new("song.mp4"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::Probe { .. }));

        let err = parse_probe_output(Path::new("x.mp4"), b"not json").unwrap_err();
        assert!(matches!(err, EngineError::Json(_)));
    }

    #[test]
    fn missing_ffprobe_is_an_error() {
        let backend = VideoBackend::new(
            PathBuf::from("/nonexistent/ffprobe"),
            PathBuf::from("/nonexistent/ffmpeg"),
            Duration::from_secs(1),
            256,
        );
        assert!(backend.extract_metadata(Path::new("clip.mp4")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn probes_through_the_configured_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffprobe");
        fs::write(
            &script,
            format!("#!/bin/sh\ncat <<'EOF'\n{PHONE_CLIP}\nEOF\n"),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let backend = VideoBackend::new(
            script,
            PathBuf::from("ffmpeg"),
            Duration::from_secs(5),
            256,
        );
        let meta = backend.extract_metadata(Path::new("clip.mp4")).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
    }
}
