use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, TranscodeError};

/// Recursively collect source files under `root`, sorted for a stable processing order.
///
/// A missing root yields no files. A root that exists but cannot be read is an
/// error; unreadable entries below it are skipped with a warning.
pub fn scan_media_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        warn!("Input directory does not exist: {}", root.display());
        return Ok(Vec::new());
    }

    info!("Scanning directory: {}", root.display());

    let wanted: Vec<String> = extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect();
    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => {
                return Err(TranscodeError::io(
                    format!("Failed to read input directory {}", root.display()),
                    e.into(),
                ));
            }
            Err(e) => {
                warn!("Error reading directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match ext {
            Some(ext) if wanted.contains(&ext) => {
                debug!("Found media file: {}", path.display());
                found.push(path.to_path_buf());
            }
            _ => continue,
        }
    }

    found.sort();
    info!("Scan complete: {} media file(s) in {}", found.len(), root.display());
    Ok(found)
}
