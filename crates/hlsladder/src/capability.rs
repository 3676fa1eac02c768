use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::TranscodeConfig;

/// Hardware features advertised by the encoding engine
pub trait CapabilityProbe {
    fn has_hardware_encoder(&self) -> bool;
    fn has_hardware_scale_filter(&self) -> bool;
}

/// Queries `ffmpeg -encoders` / `ffmpeg -filters`
pub struct FfmpegCapabilityProbe {
    ffmpeg_bin: PathBuf,
    encoder: String,
    scale_filters: Vec<String>,
}

impl FfmpegCapabilityProbe {
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            encoder: config.hardware_encoder.clone(),
            scale_filters: config.hardware_scale_filters.clone(),
        }
    }

    /// Listing output, or `None` if ffmpeg could not be run
    fn listing(&self, flag: &str) -> Option<String> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-hide_banner")
            .arg(flag)
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                // Some builds print part of the listing on stderr
                let mut text = String::from_utf8_lossy(&out.stdout).to_string();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                Some(text)
            }
            Ok(out) => {
                warn!(
                    "{} {} exited with {:?}; treating as unavailable",
                    self.ffmpeg_bin.display(),
                    flag,
                    out.status.code()
                );
                None
            }
            Err(e) => {
                warn!("Failed to run {} {}: {}", self.ffmpeg_bin.display(), flag, e);
                None
            }
        }
    }
}

/// Whole-token match, so "h264_nvenc" does not match "h264_nvenc_extra"
fn listing_contains(listing: &str, name: &str) -> bool {
    listing.split_whitespace().any(|token| token == name)
}

impl CapabilityProbe for FfmpegCapabilityProbe {
    fn has_hardware_encoder(&self) -> bool {
        self.listing("-encoders")
            .map(|l| listing_contains(&l, &self.encoder))
            .unwrap_or(false)
    }

    fn has_hardware_scale_filter(&self) -> bool {
        self.listing("-filters")
            .map(|l| self.scale_filters.iter().any(|f| listing_contains(&l, f)))
            .unwrap_or(false)
    }
}

/// Capabilities queried once per run and reused for every file and tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub hardware_encoder: bool,
    pub hardware_scale: bool,
}

impl Capabilities {
    pub fn detect(probe: &dyn CapabilityProbe) -> Self {
        let caps = Self {
            hardware_encoder: probe.has_hardware_encoder(),
            hardware_scale: probe.has_hardware_scale_filter(),
        };

        if caps.hardware_scale {
            info!("🚀 Hardware scale filter detected → GPU scaling enabled");
        } else {
            info!("Hardware scale filter not found → CPU scaling; hardware encoder is kept");
        }
        debug!("Detected capabilities: {:?}", caps);
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingProbe {
        encoder: bool,
        scale: bool,
        calls: Cell<u32>,
    }

    impl CapabilityProbe for CountingProbe {
        fn has_hardware_encoder(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.encoder
        }

        fn has_hardware_scale_filter(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.scale
        }
    }

    #[test]
    fn test_detect_queries_each_capability_once() {
        let probe = CountingProbe { encoder: true, scale: false, calls: Cell::new(0) };
        let caps = Capabilities::detect(&probe);
        assert_eq!(caps, Capabilities { hardware_encoder: true, hardware_scale: false });
        assert_eq!(probe.calls.get(), 2);
    }

    #[test]
    fn test_listing_token_match() {
        let listing = " V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)\n\
                       ... scale_cuda        V->V       GPU accelerated video resizer";
        assert!(listing_contains(listing, "h264_nvenc"));
        assert!(listing_contains(listing, "scale_cuda"));
        assert!(!listing_contains(listing, "scale_npp"));
        assert!(!listing_contains(listing, "h264"));
    }

    #[test]
    fn test_missing_binary_means_unavailable() {
        let mut config = TranscodeConfig::default_config();
        config.ffmpeg_bin = PathBuf::from("/nonexistent/bin/ffmpeg-for-tests");
        let probe = FfmpegCapabilityProbe::new(&config);
        assert!(!probe.has_hardware_encoder());
        assert!(!probe.has_hardware_scale_filter());
    }
}
