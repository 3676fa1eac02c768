use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capability::Capabilities;
use crate::config::PackagingMode;
use crate::state::{FileConversionState, FileStatus, TierResult};

/// Report file written next to the per-file output trees
pub const REPORT_FILE_NAME: &str = "mkv2hls-report.json";

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub duration_secs: f64,
    pub languages: Vec<String>,
    pub tiers: Vec<TierResult>,
    pub status: FileStatus,
    pub summary: String,
}

impl From<&FileConversionState> for FileReport {
    fn from(state: &FileConversionState) -> Self {
        Self {
            source: state.source.clone(),
            duration_secs: state.duration_secs,
            languages: state.languages.clone(),
            tiers: state.tiers.clone(),
            status: state.status.clone(),
            summary: state.status_line(),
        }
    }
}

/// Outcome of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub packaging: PackagingMode,
    pub capabilities: Capabilities,
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn new(
        started_at: DateTime<Utc>,
        packaging: PackagingMode,
        capabilities: Capabilities,
        states: &[FileConversionState],
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            packaging,
            capabilities,
            files: states.iter().map(FileReport::from).collect(),
        }
    }

    pub fn done_count(&self) -> usize {
        self.files.iter().filter(|f| f.status == FileStatus::Done).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.iter().filter(|f| matches!(f.status, FileStatus::Failed(_))).count()
    }

    /// Write the report as pretty JSON into `output_dir`
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize batch report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write batch report: {}", path.display()))?;
        Ok(path)
    }
}
