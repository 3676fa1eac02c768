use std::path::{Path, PathBuf};

use log::info;

use crate::config::EncodeTarget;
use crate::error::{Result, TranscodeError};

/// Master playlist name inside `<output_root>/<source_stem>/`
pub const MASTER_MANIFEST_NAME: &str = "master.m3u8";

/// One rendition declared in the master playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub label: String,
    pub resolution: String,
    pub bandwidth_bps: u64,
    /// Path of the tier playlist, relative to the master playlist
    pub uri: String,
}

impl ManifestEntry {
    pub fn for_target(target: &EncodeTarget) -> Self {
        Self {
            label: target.label.clone(),
            resolution: target.resolution(),
            bandwidth_bps: target.bandwidth_bps(),
            uri: format!("{}/{}.m3u8", target.label, target.label),
        }
    }
}

/// Succeeded renditions, in ladder order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Keep the ladder's order; `succeeded` only filters
    pub fn from_ladder(ladder: &[EncodeTarget], succeeded: &[&str]) -> Self {
        let entries = ladder
            .iter()
            .filter(|t| succeeded.contains(&t.label.as_str()))
            .map(ManifestEntry::for_target)
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        for entry in &self.entries {
            out.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n",
                entry.bandwidth_bps, entry.resolution
            ));
            out.push_str(&entry.uri);
            out.push('\n');
        }
        out
    }

    /// Write `master.m3u8` into `file_dir`; refuses to write an empty manifest
    pub fn write(&self, file_dir: &Path) -> Result<PathBuf> {
        if self.is_empty() {
            return Err(TranscodeError::Manifest(file_dir.display().to_string()));
        }

        let path = file_dir.join(MASTER_MANIFEST_NAME);
        std::fs::write(&path, self.render())
            .map_err(|e| TranscodeError::io(format!("Failed to write {}", path.display()), e))?;

        info!("📝 Master → {}", path.display());
        Ok(path)
    }
}
