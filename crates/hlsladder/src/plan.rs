use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::audio::AudioStreamDescriptor;
use crate::config::{EncodeTarget, PackagingMode, TranscodeConfig};
use crate::probe::MediaAsset;

/// Name of the fMP4 initialization segment, next to the tier playlist
pub const INIT_SEGMENT_NAME: &str = "init.mp4";

/// Where the resize runs. The encoder itself is always the hardware one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalingMode {
    Hardware,
    Software,
}

/// Keyframe interval that lands a keyframe on every segment boundary
pub fn gop_frames(frame_rate: f64, segment_duration_secs: u32) -> u32 {
    let frames = (frame_rate * f64::from(segment_duration_secs)).round();
    if frames.is_finite() && frames >= 1.0 {
        frames as u32
    } else {
        1
    }
}

/// Everything needed for one encode attempt of one tier
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub source: PathBuf,
    pub target: EncodeTarget,
    /// Media duration the tier's progress is measured against
    pub duration_secs: f64,
    pub gop_frames: u32,
    /// Output audio order; output track 0 is the default track
    pub audio: Vec<AudioStreamDescriptor>,
    pub scaling: ScalingMode,
    pub encoder: String,
    pub packaging: PackagingMode,
    pub segment_duration_secs: u32,
    pub audio_bitrate_kbps: u32,
    pub audio_channels: u32,
    /// `<output_root>/<stem>/<label>/`
    pub tier_dir: PathBuf,
}

impl EncodePlan {
    /// Same plan with a different scaling mode, used for the software retry
    pub fn with_scaling(&self, scaling: ScalingMode) -> Self {
        Self {
            scaling,
            ..self.clone()
        }
    }

    /// Source file name without extension, as used in log lines and output paths
    pub fn source_stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn playlist_name(&self) -> String {
        format!("{}.m3u8", self.target.label)
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.tier_dir.join(self.playlist_name())
    }

    pub fn segment_pattern(&self) -> PathBuf {
        self.tier_dir
            .join(format!("%03d.{}", self.packaging.segment_extension()))
    }

    pub fn video_filter(&self) -> String {
        let (w, h) = (self.target.width, self.target.height);
        match self.scaling {
            ScalingMode::Hardware => format!("hwupload_cuda,scale_cuda={}:{}:interp_algo=lanczos", w, h),
            ScalingMode::Software => format!("scale={}:{}:flags=lanczos", w, h),
        }
    }

    /// Full ffmpeg argument list (binary excluded)
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let kbps = self.target.bitrate_kbps;
        let gop = self.gop_frames.to_string();

        let mut args: Vec<String> = [
            "-hide_banner", "-y", "-nostats",
            "-progress", "pipe:1",
            "-loglevel", "error",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("-i".to_string());
        args.push(self.source.to_string_lossy().to_string());

        // Video: hardware encoder, constrained bitrate, keyframes on segment boundaries
        for arg in [
            "-c:v", self.encoder.as_str(),
            "-preset", "p4", "-tune", "hq", "-profile:v", "high",
            "-pix_fmt", "yuv420p",
        ] {
            args.push(arg.to_string());
        }
        args.push("-b:v".to_string());
        args.push(format!("{}k", kbps));
        args.push("-maxrate".to_string());
        args.push(format!("{}k", kbps));
        args.push("-bufsize".to_string());
        args.push(format!("{}k", kbps * 2));
        args.push("-g".to_string());
        args.push(gop.clone());
        args.push("-keyint_min".to_string());
        args.push(gop);
        args.push("-sc_threshold".to_string());
        args.push("0".to_string());

        args.push("-c:a".to_string());
        args.push("aac".to_string());
        args.push("-b:a".to_string());
        args.push(format!("{}k", self.audio_bitrate_kbps));
        args.push("-ac".to_string());
        args.push(self.audio_channels.to_string());

        args.push("-vf".to_string());
        args.push(self.video_filter());

        args.push("-map".to_string());
        args.push("0:v:0".to_string());
        for track in &self.audio {
            args.push("-map".to_string());
            args.push(format!("0:a:{}", track.position));
        }
        for (out_idx, track) in self.audio.iter().enumerate() {
            args.push(format!("-metadata:s:a:{}", out_idx));
            args.push(format!("language={}", track.language));
        }
        if !self.audio.is_empty() {
            args.push("-disposition:a:0".to_string());
            args.push("default".to_string());
        }

        args.push("-f".to_string());
        args.push("hls".to_string());
        args.push("-hls_time".to_string());
        args.push(self.segment_duration_secs.to_string());
        args.push("-hls_playlist_type".to_string());
        args.push("vod".to_string());
        args.push("-hls_list_size".to_string());
        args.push("0".to_string());

        let segments = self.segment_pattern().to_string_lossy().to_string();
        match self.packaging {
            PackagingMode::Fmp4 => {
                args.push("-hls_flags".to_string());
                args.push("independent_segments+split_by_time".to_string());
                args.push("-hls_segment_type".to_string());
                args.push("fmp4".to_string());
                args.push("-hls_fmp4_init_filename".to_string());
                args.push(INIT_SEGMENT_NAME.to_string());
                args.push("-hls_segment_filename".to_string());
                args.push(segments);
            }
            PackagingMode::Ts => {
                args.push("-hls_flags".to_string());
                args.push("independent_segments".to_string());
                args.push("-hls_segment_filename".to_string());
                args.push(segments);
            }
        }

        args.push(self.playlist_path().to_string_lossy().to_string());
        args
    }
}

/// Turns probed metadata and a ladder tier into an encode plan
pub struct EncodePlanBuilder<'a> {
    config: &'a TranscodeConfig,
}

impl<'a> EncodePlanBuilder<'a> {
    pub fn new(config: &'a TranscodeConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        asset: &MediaAsset,
        audio: &[AudioStreamDescriptor],
        target: &EncodeTarget,
        scaling: ScalingMode,
        file_dir: &Path,
    ) -> EncodePlan {
        EncodePlan {
            source: asset.path.clone(),
            target: target.clone(),
            duration_secs: asset.duration_secs,
            gop_frames: gop_frames(asset.frame_rate, self.config.segment_duration_secs),
            audio: audio.to_vec(),
            scaling,
            encoder: self.config.hardware_encoder.clone(),
            packaging: self.config.packaging,
            segment_duration_secs: self.config.segment_duration_secs,
            audio_bitrate_kbps: self.config.audio_bitrate_kbps,
            audio_channels: self.config.audio_channels,
            tier_dir: file_dir.join(&target.label),
        }
    }
}
