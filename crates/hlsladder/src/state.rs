use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Result of one (file, tier) encode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum EncodeOutcome {
    Pending,
    Succeeded,
    Failed(String),
}

impl EncodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EncodeOutcome::Succeeded)
    }
}

/// Outcome recorded against its tier label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierResult {
    pub label: String,
    pub outcome: EncodeOutcome,
}

impl TierResult {
    pub fn new(label: &str, outcome: EncodeOutcome) -> Self {
        Self {
            label: label.to_string(),
            outcome,
        }
    }
}

/// Lifecycle of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum FileStatus {
    Scanning,
    Pending,
    Done,
    Failed(String),
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Failed(_))
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Scanning => write!(f, "scanning"),
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Done => write!(f, "done"),
            FileStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Terminal status for a file once every tier has been attempted
pub fn reduce_status(results: &[TierResult]) -> FileStatus {
    if results.iter().any(|r| r.outcome.is_success()) {
        FileStatus::Done
    } else if results.is_empty() {
        FileStatus::Failed("no rendition attempted".to_string())
    } else {
        FileStatus::Failed("no rendition succeeded".to_string())
    }
}

/// Per-file bookkeeping, written only by the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct FileConversionState {
    pub source: PathBuf,
    pub name: String,
    pub duration_secs: f64,
    /// Normalized languages in output order
    pub languages: Vec<String>,
    pub tiers: Vec<TierResult>,
    /// Media seconds credited to the file counter (whole tiers only)
    pub encoded_secs: f64,
    pub status: FileStatus,
}

impl FileConversionState {
    pub fn new(source: PathBuf) -> Self {
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            source,
            name,
            duration_secs: 0.0,
            languages: Vec::new(),
            tiers: Vec::new(),
            encoded_secs: 0.0,
            status: FileStatus::Scanning,
        }
    }

    pub fn mark_pending(&mut self, duration_secs: f64, languages: Vec<String>) {
        self.duration_secs = duration_secs;
        self.languages = languages;
        self.status = FileStatus::Pending;
    }

    /// Register every tier as pending, in ladder order, before the first encode
    pub fn plan_tiers<'l>(&mut self, labels: impl IntoIterator<Item = &'l str>) {
        self.tiers = labels
            .into_iter()
            .map(|label| TierResult::new(label, EncodeOutcome::Pending))
            .collect();
    }

    /// Finalize a planned tier in place; a tier that was never planned is appended
    pub fn record(&mut self, result: TierResult) {
        match self.tiers.iter_mut().find(|t| t.label == result.label) {
            Some(planned) => planned.outcome = result.outcome,
            None => self.tiers.push(result),
        }
    }

    pub fn pending_labels(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .filter(|t| t.outcome == EncodeOutcome::Pending)
            .map(|t| t.label.as_str())
            .collect()
    }

    pub fn succeeded_labels(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .filter(|t| t.outcome.is_success())
            .map(|t| t.label.as_str())
            .collect()
    }

    pub fn failed_labels(&self) -> Vec<&str> {
        self.tiers
            .iter()
            .filter(|t| matches!(t.outcome, EncodeOutcome::Failed(_)))
            .map(|t| t.label.as_str())
            .collect()
    }

    /// Human summary, e.g. "OK (1080p, 480p) · ERROR (720p)"
    pub fn status_line(&self) -> String {
        let ok = self.succeeded_labels();
        let failed = self.failed_labels();

        let mut parts = Vec::new();
        if !ok.is_empty() {
            parts.push(format!("OK ({})", ok.join(", ")));
        }
        if !failed.is_empty() {
            parts.push(format!("ERROR ({})", failed.join(", ")));
        }

        match (&self.status, parts.is_empty()) {
            (FileStatus::Failed(reason), true) => format!("ERROR: {}", reason),
            (status, true) => status.to_string(),
            (_, false) => parts.join(" · "),
        }
    }
}
