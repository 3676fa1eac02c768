pub mod audio;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod report;
pub mod scan;
pub mod state;

pub use audio::{AudioStreamDescriptor, AudioTrackClassifier, DubVariant};
pub use capability::{Capabilities, CapabilityProbe, FfmpegCapabilityProbe};
pub use config::{EncodeTarget, PackagingMode, TranscodeConfig};
pub use engine::{EncodeProcess, EncodingEngine, FfmpegEngine};
pub use error::TranscodeError;
pub use executor::TranscodeExecutor;
pub use manifest::Manifest;
pub use pipeline::PipelineOrchestrator;
pub use plan::{EncodePlan, EncodePlanBuilder, ScalingMode};
pub use probe::{FfprobeProbe, MediaAsset, MediaProbe};
pub use progress::ProgressAggregator;
pub use report::BatchReport;
pub use state::{EncodeOutcome, FileConversionState, FileStatus};
