use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::TranscodeError;

/// One rung of the bitrate ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTarget {
    /// Label used for the tier directory, playlist name and logs (e.g. "720p")
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in kbps
    pub bitrate_kbps: u32,
}

impl EncodeTarget {
    pub fn new(label: &str, width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
            bitrate_kbps,
        }
    }

    /// "WIDTHxHEIGHT", as declared in the master manifest
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Declared bandwidth in bits per second
    pub fn bandwidth_bps(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}

/// How encoded output is packaged into segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackagingMode {
    /// MPEG-TS segments (`000.ts`, `001.ts`, ...)
    #[default]
    Ts,
    /// Fragmented MP4 segments sharing an `init.mp4`
    Fmp4,
}

impl PackagingMode {
    pub fn segment_extension(&self) -> &'static str {
        match self {
            PackagingMode::Ts => "ts",
            PackagingMode::Fmp4 => "m4s",
        }
    }
}

impl fmt::Display for PackagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackagingMode::Ts => write!(f, "TS"),
            PackagingMode::Fmp4 => write!(f, "fMP4"),
        }
    }
}

impl FromStr for PackagingMode {
    type Err = TranscodeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ts" | "1" => Ok(PackagingMode::Ts),
            "fmp4" | "m4s" | "2" => Ok(PackagingMode::Fmp4),
            other => Err(TranscodeError::Config(format!(
                "unknown packaging mode '{}' (expected ts or fmp4)",
                other
            ))),
        }
    }
}

/// Configuration for a batch conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Directory scanned recursively for source files
    pub input_dir: PathBuf,
    /// Root under which `<source_stem>/` output trees are created
    pub output_dir: PathBuf,
    /// Source file extensions to pick up while scanning
    pub media_extensions: Vec<String>,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    /// Renditions, highest quality first
    pub ladder: Vec<EncodeTarget>,
    /// HLS segment length; keyframes are forced on the same interval
    pub segment_duration_secs: u32,
    pub audio_bitrate_kbps: u32,
    pub audio_channels: u32,
    /// Fall back to CPU scaling when hardware scaling is missing or fails
    pub soft_scale_if_needed: bool,
    /// Remove the source file once at least one rendition succeeded
    pub delete_source: bool,
    pub packaging: PackagingMode,
    /// Encoder that must be advertised by ffmpeg
    pub hardware_encoder: String,
    /// Any one of these filters enables hardware scaling
    pub hardware_scale_filters: Vec<String>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl TranscodeConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            media_extensions: vec!["mkv".to_string()],
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            ladder: vec![
                EncodeTarget::new("1080p", 1920, 1080, 7000),
                EncodeTarget::new("720p", 1280, 720, 4000),
                EncodeTarget::new("480p", 854, 480, 2000),
            ],
            segment_duration_secs: 10,
            audio_bitrate_kbps: 128,
            audio_channels: 2,
            soft_scale_if_needed: true,
            delete_source: false,
            packaging: PackagingMode::Ts,
            hardware_encoder: "h264_nvenc".to_string(),
            hardware_scale_filters: vec!["scale_cuda".to_string(), "scale_npp".to_string()],
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject ladders and timings the encoder cannot honour
    pub fn validate(&self) -> std::result::Result<(), TranscodeError> {
        if self.ladder.is_empty() {
            return Err(TranscodeError::Config("resolution ladder is empty".to_string()));
        }
        if self.segment_duration_secs == 0 {
            return Err(TranscodeError::Config("segment_duration_secs must be > 0".to_string()));
        }
        if self.audio_bitrate_kbps == 0 || self.audio_channels == 0 {
            return Err(TranscodeError::Config("audio bitrate and channel count must be > 0".to_string()));
        }

        let mut seen = HashSet::new();
        for target in &self.ladder {
            if target.width == 0 || target.height == 0 || target.bitrate_kbps == 0 {
                return Err(TranscodeError::Config(format!(
                    "tier '{}' has a zero dimension or bitrate",
                    target.label
                )));
            }
            if target.label.is_empty() || !seen.insert(target.label.as_str()) {
                return Err(TranscodeError::Config(format!(
                    "tier label '{}' is empty or duplicated",
                    target.label
                )));
            }
        }

        Ok(())
    }
}
