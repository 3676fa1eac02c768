use std::io;

use log::debug;

use crate::engine::EncodeProcess;

/// One discrete event from the engine's `-progress` channel
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Media time encoded so far, in seconds
    OutTime(f64),
    /// Instantaneous speed, e.g. "1.97x"; display only
    Speed(String),
    /// A progress block finished; more will follow
    Continue,
    /// Explicit end-of-stream marker, distinct from process exit
    End,
}

impl ProgressEvent {
    /// Parse a `key=value` progress line; unknown keys and `N/A` values yield `None`
    pub fn parse(line: &str) -> Option<Self> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key.trim() {
            // Both keys carry microseconds
            "out_time_us" | "out_time_ms" => {
                let micros: i64 = value.parse().ok()?;
                Some(ProgressEvent::OutTime(micros.max(0) as f64 / 1_000_000.0))
            }
            "speed" if value != "N/A" => Some(ProgressEvent::Speed(value.to_string())),
            "progress" => match value {
                "end" => Some(ProgressEvent::End),
                "continue" => Some(ProgressEvent::Continue),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Blocking iterator over the progress events of a running encode.
///
/// Iteration stops right after [`ProgressEvent::End`] or when the channel
/// closes; [`ProgressEvents::saw_end`] tells the two apart. Reaping the
/// process is left to the caller.
pub struct ProgressEvents<'p> {
    process: &'p mut dyn EncodeProcess,
    saw_end: bool,
    exhausted: bool,
}

impl<'p> ProgressEvents<'p> {
    pub fn new(process: &'p mut dyn EncodeProcess) -> Self {
        Self {
            process,
            saw_end: false,
            exhausted: false,
        }
    }

    pub fn saw_end(&self) -> bool {
        self.saw_end
    }
}

impl Iterator for ProgressEvents<'_> {
    type Item = io::Result<ProgressEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        loop {
            match self.process.read_line() {
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                Ok(None) => {
                    self.exhausted = true;
                    return None;
                }
                Ok(Some(line)) => {
                    let Some(event) = ProgressEvent::parse(&line) else {
                        continue;
                    };
                    if event == ProgressEvent::End {
                        self.saw_end = true;
                        self.exhausted = true;
                    }
                    return Some(Ok(event));
                }
            }
        }
    }
}

/// Counter for the tier currently being encoded
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionCounter {
    pub label: String,
    pub total_secs: f64,
    pub completed_secs: f64,
    pub speed: Option<String>,
}

/// Nested progress: the active tier, and the file as a whole.
///
/// The file counter only moves in whole tier durations, when a tier
/// succeeds. Partial progress of a failed attempt never reaches it.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    file_label: String,
    file_total_secs: f64,
    file_completed_secs: f64,
    active: Option<ResolutionCounter>,
}

impl ProgressAggregator {
    /// File counter sized for `tier_count` encodes of `duration_secs` each
    pub fn new(file_label: &str, duration_secs: f64, tier_count: usize) -> Self {
        Self {
            file_label: file_label.to_string(),
            file_total_secs: duration_secs.max(0.0) * tier_count as f64,
            file_completed_secs: 0.0,
            active: None,
        }
    }

    pub fn begin_resolution(&mut self, label: &str, total_secs: f64) {
        self.active = Some(ResolutionCounter {
            label: label.to_string(),
            total_secs: total_secs.max(0.0),
            completed_secs: 0.0,
            speed: None,
        });
    }

    /// Move the active counter to `seconds`, clamped to the tier duration and never backwards
    pub fn advance_to(&mut self, seconds: f64) {
        if let Some(active) = self.active.as_mut() {
            let clamped = seconds.clamp(0.0, active.total_secs);
            if clamped > active.completed_secs {
                active.completed_secs = clamped;
            }
        }
    }

    pub fn set_speed(&mut self, speed: &str) {
        if let Some(active) = self.active.as_mut() {
            debug!("{} [{}]: encoding @ {}", self.file_label, active.label, speed);
            active.speed = Some(speed.to_string());
        }
    }

    /// Reset the active counter before a retry of the same tier
    pub fn restart_resolution(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.completed_secs = 0.0;
            active.speed = None;
        }
    }

    /// Finalize the active tier as succeeded; returns the amount credited to the file
    pub fn complete_resolution(&mut self) -> f64 {
        match self.active.take() {
            Some(active) => {
                self.file_completed_secs =
                    (self.file_completed_secs + active.total_secs).min(self.file_total_secs);
                active.total_secs
            }
            None => 0.0,
        }
    }

    /// Finalize the active tier as failed; nothing is credited
    pub fn abandon_resolution(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&ResolutionCounter> {
        self.active.as_ref()
    }

    pub fn resolution_completed_secs(&self) -> f64 {
        self.active.as_ref().map(|a| a.completed_secs).unwrap_or(0.0)
    }

    pub fn file_completed_secs(&self) -> f64 {
        self.file_completed_secs
    }

    pub fn file_total_secs(&self) -> f64 {
        self.file_total_secs
    }

    pub fn file_fraction(&self) -> f64 {
        if self.file_total_secs > 0.0 {
            self.file_completed_secs / self.file_total_secs
        } else {
            0.0
        }
    }
}
