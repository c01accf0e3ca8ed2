use anyhow::{bail, Context, Result};
use clap::Parser;
use converter::{
    config::ConverterConfig,
    ffmpeg::FFmpegEncoder,
    reveal::{LogOnlyRevealer, Reveal, SystemRevealer},
    run_batch, BatchSummary, JobOutcome, SUPPORTED_FORMATS,
};
use log::{info, warn, error, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Batch-convert everything in the Input folder through a lossless FFV1 intermediate
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output format (webm, mkv, flv, vob, avi, mov, wmv, mp4, mpg, mpeg, 3gp); prompted for when omitted
    #[arg(short, long)]
    format: Option<String>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder holding the files to convert
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Folder receiving converted files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Folder for intermediate files
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Path to the ffmpeg binary (overrides FFMPEG_BIN)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Number of files converted at the same time
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Kill an encoder stage after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not open the Input folder when it is empty
    #[arg(long)]
    no_reveal: bool,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Layer command-line values over file and environment configuration
    fn apply_to(&self, cfg: &mut ConverterConfig) {
        if let Some(dir) = &self.input_dir {
            cfg.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            cfg.output_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            cfg.work_dir = dir.clone();
        }
        if let Some(bin) = &self.ffmpeg {
            cfg.ffmpeg_bin = bin.clone();
        }
        if let Some(jobs) = self.jobs {
            cfg.jobs = jobs.max(1);
        }
        if self.timeout.is_some() {
            cfg.stage_timeout_secs = self.timeout;
        }
        if self.no_reveal {
            cfg.reveal_empty_input = false;
        }
    }
}

fn prompt_text() -> String {
    format!("Enter output format ({}): ", SUPPORTED_FORMATS.join(", "))
}

/// Ask for the output format on stdin; validation happens later, per file
async fn prompt_format() -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt_text().as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read output format from stdin")?;
    if read == 0 {
        bail!("No output format given (stdin closed)");
    }
    Ok(line.trim().to_string())
}

fn log_summary(summary: &BatchSummary) {
    if summary.empty_input {
        return;
    }
    for report in &summary.reports {
        match &report.outcome {
            JobOutcome::Converted => {}
            JobOutcome::Unsupported { reason } => {
                warn!("  {}: {}", report.input.display(), reason);
            }
            JobOutcome::Failed { errors } => {
                for e in errors {
                    warn!("  {}: {}", report.input.display(), e.lines().next().unwrap_or_default());
                }
            }
        }
    }
    info!(
        "Done: {} converted, {} failed, {} unsupported (of {} file(s))",
        summary.converted(),
        summary.failed(),
        summary.unsupported(),
        summary.total()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins unless --verbose is given; default to info
    let mut logger = env_logger::Builder::new();
    logger.filter_level(LevelFilter::Info).parse_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.format_timestamp_secs().init();

    let mut cfg = ConverterConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    cfg.apply_env();
    args.apply_to(&mut cfg);

    let format = match &args.format {
        Some(f) => f.trim().to_string(),
        None => prompt_format().await?,
    };

    info!("Media converter starting");
    info!("  Output format: {}", format);
    info!("  Input folder: {}", cfg.input_dir.display());
    info!("  Output folder: {}", cfg.output_dir.display());
    info!("  Intermediate folder: {}", cfg.work_dir.display());
    info!("  Parallel jobs: {}", cfg.jobs);

    let encoder = FFmpegEncoder::from_config(&cfg);
    match encoder.detect_version().await {
        Ok(version) => info!("Using FFmpeg {} at {}", version, cfg.ffmpeg_bin.display()),
        Err(e) => warn!("Could not determine FFmpeg version ({}): {:#}", cfg.ffmpeg_bin.display(), e),
    }

    let revealer: Box<dyn Reveal> = if cfg.reveal_empty_input {
        Box::new(SystemRevealer)
    } else {
        Box::new(LogOnlyRevealer)
    };

    let summary = run_batch(Arc::new(encoder), &cfg, &format, revealer.as_ref())
        .await
        .context("Failed to prepare Input/Output folders")?;

    log_summary(&summary);

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        if let Err(e) = std::fs::write(path, json) {
            error!("Failed to write summary to {}: {}", path.display(), e);
        }
    }

    Ok(())
}
