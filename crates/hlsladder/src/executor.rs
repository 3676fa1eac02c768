use std::io;

use log::{debug, warn};

use crate::engine::{EncodeProcess, EncodingEngine};
use crate::error::{Result, TranscodeError};
use crate::plan::{EncodePlan, ScalingMode};
use crate::progress::{ProgressAggregator, ProgressEvent, ProgressEvents};
use crate::state::EncodeOutcome;

/// What a successful attempt consumed
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    /// Media seconds reported by the engine, clamped to the tier duration
    pub media_secs: f64,
    /// Whether the explicit end marker was seen before the channel closed
    pub saw_end: bool,
}

/// Final result of a tier after the optional fallback
#[derive(Debug, Clone, PartialEq)]
pub struct TierRun {
    pub outcome: EncodeOutcome,
    pub attempts: u32,
    /// Scaling mode of the last attempt
    pub scaling: ScalingMode,
}

/// Runs encode plans against an engine, with one software-scaling retry
pub struct TranscodeExecutor<'e> {
    engine: &'e dyn EncodingEngine,
    soft_fallback: bool,
}

fn consume_progress(process: &mut dyn EncodeProcess, progress: &mut ProgressAggregator) -> io::Result<bool> {
    let mut events = ProgressEvents::new(process);
    for event in events.by_ref() {
        match event? {
            ProgressEvent::OutTime(seconds) => progress.advance_to(seconds),
            ProgressEvent::Speed(speed) => progress.set_speed(&speed),
            ProgressEvent::Continue | ProgressEvent::End => {}
        }
    }
    Ok(events.saw_end())
}

impl<'e> TranscodeExecutor<'e> {
    pub fn new(engine: &'e dyn EncodingEngine, soft_fallback: bool) -> Self {
        Self { engine, soft_fallback }
    }

    /// Run one attempt. The process is always reaped, whatever happens while reading.
    pub fn execute(&self, plan: &EncodePlan, progress: &mut ProgressAggregator) -> Result<AttemptSummary> {
        let args = plan.to_ffmpeg_args();
        let mut process = self.engine.launch(&args, &plan.tier_dir)?;

        let saw_end = match consume_progress(process.as_mut(), progress) {
            Ok(saw_end) => saw_end,
            Err(read_error) => {
                // Nobody drains stdout any more; the child would block on a full pipe
                if let Err(e) = process.kill() {
                    warn!("[{}] failed to stop encoder after read error: {}", plan.target.label, e);
                }
                process
                    .wait()
                    .map_err(|e| TranscodeError::Encode(format!("failed to wait for encoder: {}", e)))?;
                return Err(TranscodeError::Encode(format!(
                    "progress stream read failed: {}",
                    read_error
                )));
            }
        };

        let exit = process
            .wait()
            .map_err(|e| TranscodeError::Encode(format!("failed to wait for encoder: {}", e)))?;

        match exit {
            Some(0) => {}
            code => {
                let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
                let detail = process
                    .failure_detail()
                    .map(|d| format!(": {}", d))
                    .unwrap_or_default();
                return Err(TranscodeError::Encode(format!("encoder exited with {}{}", code, detail)));
            }
        }

        if !saw_end {
            debug!("[{}] encoder exited cleanly without an end marker", plan.target.label);
        }

        Ok(AttemptSummary {
            media_secs: progress.resolution_completed_secs(),
            saw_end,
        })
    }

    /// Run a tier to its final outcome.
    ///
    /// A failed hardware-scaling attempt is retried once with software
    /// scaling when the fallback policy allows it. The file counter is
    /// credited once, only on success.
    pub fn run_tier(&self, plan: &EncodePlan, progress: &mut ProgressAggregator) -> TierRun {
        let label = plan.target.label.as_str();
        progress.begin_resolution(label, plan.duration_secs);

        let first_error = match self.execute(plan, progress) {
            Ok(_) => {
                progress.complete_resolution();
                return TierRun {
                    outcome: EncodeOutcome::Succeeded,
                    attempts: 1,
                    scaling: plan.scaling,
                };
            }
            Err(e) => e,
        };

        if !(self.soft_fallback && plan.scaling == ScalingMode::Hardware) {
            progress.abandon_resolution();
            return TierRun {
                outcome: EncodeOutcome::Failed(first_error.to_string()),
                attempts: 1,
                scaling: plan.scaling,
            };
        }

        warn!(
            "{} [{}]: falling back to CPU scale ({})",
            plan.source_stem(),
            label,
            first_error
        );
        progress.restart_resolution();
        let fallback = plan.with_scaling(ScalingMode::Software);

        let outcome = match self.execute(&fallback, progress) {
            Ok(_) => {
                progress.complete_resolution();
                EncodeOutcome::Succeeded
            }
            Err(second_error) => {
                progress.abandon_resolution();
                EncodeOutcome::Failed(second_error.to_string())
            }
        };

        TierRun {
            outcome,
            attempts: 2,
            scaling: ScalingMode::Software,
        }
    }
}
