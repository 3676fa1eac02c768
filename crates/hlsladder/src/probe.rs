use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use serde::Deserialize;

use crate::error::{Result, TranscodeError};

/// Frame rate assumed when the container does not declare one
pub const DEFAULT_FRAME_RATE: f64 = 25.0;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    #[serde(default)]
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FFProbeFormat {
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub r_frame_rate: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

impl FFProbeStream {
    fn is_type(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    /// Tag value by key; lower-case spelling wins over upper-case, then any
    /// other casing. Blank values count as absent.
    pub fn tag(&self, key: &str) -> Option<String> {
        let tags = self.tags.as_ref()?;
        let non_blank = |v: &String| {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        };

        tags.get(&key.to_lowercase())
            .and_then(non_blank)
            .or_else(|| tags.get(&key.to_uppercase()).and_then(non_blank))
            .or_else(|| {
                let mut others: Vec<_> = tags
                    .iter()
                    .filter(|(k, _)| k.eq_ignore_ascii_case(key))
                    .collect();
                others.sort();
                others.into_iter().find_map(|(_, v)| non_blank(v))
            })
    }
}

/// Raw tag text of one audio stream, exactly as discovered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioStreamTags {
    /// 0-based position among the audio streams of the source
    pub position: usize,
    pub language: Option<String>,
    pub title: Option<String>,
    pub handler: Option<String>,
}

impl AudioStreamTags {
    pub fn new(position: usize) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn handler(mut self, handler: &str) -> Self {
        self.handler = Some(handler.to_string());
        self
    }
}

/// Probed description of a source file; immutable once read
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub path: PathBuf,
    /// Container duration in seconds (0.0 when unknown)
    pub duration_secs: f64,
    pub frame_rate: f64,
    pub audio_streams: Vec<AudioStreamTags>,
    pub video_present: bool,
}

impl MediaAsset {
    /// File stem used to name the output tree
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }
}

/// Source metadata provider
pub trait MediaProbe {
    fn describe(&self, path: &Path) -> Result<MediaAsset>;
}

/// Probe backed by the ffprobe binary
pub struct FfprobeProbe {
    ffprobe_bin: PathBuf,
}

impl FfprobeProbe {
    pub fn new(ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
        }
    }
}

impl MediaProbe for FfprobeProbe {
    fn describe(&self, path: &Path) -> Result<MediaAsset> {
        if !path.exists() {
            return Err(TranscodeError::probe(path, "file does not exist"));
        }

        debug!("Executing FFprobe for: {}", path.display());

        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(path)
            .output()
            .map_err(|e| {
                TranscodeError::probe(
                    path,
                    format!("failed to execute {}: {}", self.ffprobe_bin.display(), e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::probe(
                path,
                format!(
                    "ffprobe exited with code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            ));
        }

        let data: FFProbeData = serde_json::from_slice(&output.stdout)
            .map_err(|e| TranscodeError::probe(path, format!("unparseable ffprobe JSON: {}", e)))?;

        media_asset_from_probe(path, &data)
    }
}

/// Parse an ffprobe rational such as "24000/1001"
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Build the asset description from parsed ffprobe output
pub fn media_asset_from_probe(path: &Path, data: &FFProbeData) -> Result<MediaAsset> {
    if data.streams.is_empty() {
        return Err(TranscodeError::probe(path, "no media streams"));
    }

    let duration_secs = data
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    let video = data.streams.iter().find(|s| s.is_type("video"));
    let Some(video) = video else {
        return Err(TranscodeError::probe(path, "no video stream"));
    };

    let frame_rate = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(DEFAULT_FRAME_RATE);

    let audio_streams = data
        .streams
        .iter()
        .filter(|s| s.is_type("audio"))
        .enumerate()
        .map(|(position, s)| AudioStreamTags {
            position,
            language: s.tag("language"),
            title: s.tag("title"),
            handler: s.tag("handler_name"),
        })
        .collect();

    Ok(MediaAsset {
        path: path.to_path_buf(),
        duration_secs,
        frame_rate,
        audio_streams,
        video_present: true,
    })
}
