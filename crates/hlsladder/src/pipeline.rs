use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::audio::AudioTrackClassifier;
use crate::capability::Capabilities;
use crate::config::TranscodeConfig;
use crate::engine::EncodingEngine;
use crate::error::{Result, TranscodeError};
use crate::executor::TranscodeExecutor;
use crate::manifest::Manifest;
use crate::plan::{EncodePlanBuilder, ScalingMode};
use crate::probe::MediaProbe;
use crate::progress::ProgressAggregator;
use crate::state::{reduce_status, EncodeOutcome, FileConversionState, FileStatus, TierResult};

/// Sequences probe → classify → plan → execute → manifest for each file
pub struct PipelineOrchestrator<'a> {
    config: TranscodeConfig,
    probe: &'a dyn MediaProbe,
    engine: &'a dyn EncodingEngine,
    capabilities: Capabilities,
    classifier: AudioTrackClassifier,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        config: TranscodeConfig,
        probe: &'a dyn MediaProbe,
        engine: &'a dyn EncodingEngine,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            config,
            probe,
            engine,
            capabilities,
            classifier: AudioTrackClassifier::new(),
        }
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// Convert every source in order; a failing file never stops the batch
    pub fn run_batch(&self, sources: &[PathBuf]) -> Vec<FileConversionState> {
        let total = sources.len();
        sources
            .iter()
            .enumerate()
            .map(|(idx, source)| {
                info!("🎬 [{}/{}] {}", idx + 1, total, source.display());
                self.convert_file(source)
            })
            .collect()
    }

    /// Convert one source. Every error is caught here and folded into the returned state.
    pub fn convert_file(&self, source: &Path) -> FileConversionState {
        let mut state = FileConversionState::new(source.to_path_buf());

        if let Err(e) = self.try_convert(source, &mut state) {
            error!("❌ {}: {}", state.name, e);
            state.status = FileStatus::Failed(e.to_string());
        }

        match &state.status {
            FileStatus::Done => info!("✅ {}: {}", state.name, state.status_line()),
            _ => warn!("{}: {}", state.name, state.status_line()),
        }
        state
    }

    /// Scaling mode for this run, or a capability error that aborts the file
    fn scaling_mode(&self) -> Result<ScalingMode> {
        if !self.capabilities.hardware_encoder {
            return Err(TranscodeError::Capability(format!(
                "{} is not available in this ffmpeg build",
                self.config.hardware_encoder
            )));
        }

        if self.capabilities.hardware_scale {
            Ok(ScalingMode::Hardware)
        } else if self.config.soft_scale_if_needed {
            Ok(ScalingMode::Software)
        } else {
            Err(TranscodeError::Capability(
                "hardware scale filter missing and soft scaling is disabled".to_string(),
            ))
        }
    }

    fn try_convert(&self, source: &Path, state: &mut FileConversionState) -> Result<()> {
        let asset = self.probe.describe(source)?;
        let audio = self.classifier.classify(&asset.audio_streams);
        state.mark_pending(
            asset.duration_secs,
            audio.iter().map(|t| t.language.clone()).collect(),
        );

        let scaling = self.scaling_mode()?;
        if scaling == ScalingMode::Software {
            warn!("{}: hardware scaling unavailable, every tier uses CPU scale", state.name);
        }

        let ladder = &self.config.ladder;
        let file_dir = self.config.output_dir.join(asset.stem());
        for target in ladder {
            let tier_dir = file_dir.join(&target.label);
            fs::create_dir_all(&tier_dir)
                .map_err(|e| TranscodeError::io(format!("Failed to create {}", tier_dir.display()), e))?;
        }

        let builder = EncodePlanBuilder::new(&self.config);
        let executor = TranscodeExecutor::new(self.engine, self.config.soft_scale_if_needed);
        let mut progress = ProgressAggregator::new(&state.name, asset.duration_secs, ladder.len());

        state.plan_tiers(ladder.iter().map(|t| t.label.as_str()));
        for target in ladder {
            let plan = builder.build(&asset, &audio, target, scaling, &file_dir);
            let run = executor.run_tier(&plan, &mut progress);

            if let EncodeOutcome::Failed(reason) = &run.outcome {
                error!("{} [{}]: {}", state.name, target.label, reason);
            } else {
                info!(
                    "{} → {} OK ({} attempt(s), {:?} scale)",
                    state.name, target.label, run.attempts, run.scaling
                );
            }
            state.record(TierResult::new(&target.label, run.outcome));
            info!(
                "{}: {:.0}% of all renditions encoded",
                state.name,
                progress.file_fraction() * 100.0
            );
        }
        state.encoded_secs = progress.file_completed_secs();

        let manifest = Manifest::from_ladder(ladder, &state.succeeded_labels());
        manifest.write(&file_dir)?;
        state.status = reduce_status(&state.tiers);

        if self.config.delete_source && state.status == FileStatus::Done {
            remove_source(source);
        }

        Ok(())
    }
}

/// Best-effort: failures are logged and never change the file's status
fn remove_source(source: &Path) {
    match fs::remove_file(source) {
        Ok(()) => warn!("🗑️  Source removed: {}", source.display()),
        Err(e) => warn!("Could not remove source {}: {}", source.display(), e),
    }
}
