use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use hlsladder::{
    report::BatchReport, scan, Capabilities, FfmpegCapabilityProbe, FfmpegEngine, FfprobeProbe,
    PackagingMode, PipelineOrchestrator, TranscodeConfig,
};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;

/// Batch MKV → multi-resolution HLS converter using the NVENC hardware encoder
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory scanned recursively for sources
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Root directory for the HLS output trees
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Segment packaging: ts or fmp4
    #[arg(short, long)]
    mode: Option<PackagingMode>,

    /// Delete each source once at least one rendition succeeded
    #[arg(long)]
    delete_source: bool,

    /// Never fall back to CPU scaling
    #[arg(long)]
    no_soft_scale: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    let mut cfg = TranscodeConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(input) = args.input {
        cfg.input_dir = input;
    }
    if let Some(output) = args.output {
        cfg.output_dir = output;
    }
    if let Some(mode) = args.mode {
        cfg.packaging = mode;
    }
    if args.delete_source {
        cfg.delete_source = true;
    }
    if args.no_soft_scale {
        cfg.soft_scale_if_needed = false;
    }

    info!("MKV → HLS starting");
    info!("Configuration loaded:");
    info!("  Input dir: {}", cfg.input_dir.display());
    info!("  Output dir: {}", cfg.output_dir.display());
    info!("  Packaging: {}", cfg.packaging);
    info!("  Ladder: {}", cfg.ladder.iter().map(|t| t.label.as_str()).collect::<Vec<_>>().join(", "));
    info!("  Soft scale fallback: {}", cfg.soft_scale_if_needed);
    info!("  Delete source: {}", cfg.delete_source);

    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", cfg.output_dir.display()))?;

    let sources = scan::scan_media_files(&cfg.input_dir, &cfg.media_extensions)
        .with_context(|| format!("Failed to scan input directory: {}", cfg.input_dir.display()))?;
    if sources.is_empty() {
        warn!("No .{} files found in {}", cfg.media_extensions.join("/."), cfg.input_dir.display());
        return Ok(());
    }

    let started_at = Utc::now();
    let capabilities = Capabilities::detect(&FfmpegCapabilityProbe::new(&cfg));
    if !capabilities.hardware_encoder {
        error!(
            "{} is not available in your FFmpeg build; every file will fail. Install a build with NVENC.",
            cfg.hardware_encoder
        );
    }

    let probe = FfprobeProbe::new(&cfg.ffprobe_bin);
    let engine = FfmpegEngine::new(&cfg.ffmpeg_bin);
    let packaging = cfg.packaging;
    let output_dir = cfg.output_dir.clone();
    let pipeline = PipelineOrchestrator::new(cfg, &probe, &engine, capabilities);

    let states = pipeline.run_batch(&sources);

    for (idx, state) in states.iter().enumerate() {
        let duration = if state.duration_secs > 0.0 {
            format!("{:.1}s", state.duration_secs)
        } else {
            "-".to_string()
        };
        let langs = if state.languages.is_empty() {
            "–".to_string()
        } else {
            state.languages.join(", ")
        };
        info!("{:>3}  {}  {}  [{}]  {}", idx + 1, state.name, duration, langs, state.status_line());
    }

    let report = BatchReport::new(started_at, packaging, capabilities, &states);
    match report.save(&output_dir) {
        Ok(path) => info!("Report → {}", path.display()),
        Err(e) => warn!("Failed to write batch report: {:#}", e),
    }

    let unfinished = states.iter().filter(|s| !s.status.is_terminal()).count();
    if unfinished > 0 {
        warn!("{} file(s) did not reach a terminal state", unfinished);
    }
    info!(
        "Done ({}): {} converted, {} failed. Outputs are under {}/<name>/master.m3u8",
        packaging,
        report.done_count(),
        report.failed_count(),
        output_dir.display()
    );

    Ok(())
}
