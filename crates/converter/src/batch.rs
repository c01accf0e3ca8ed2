use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use crate::codec::resolve_profile;
use crate::config::ConverterConfig;
use crate::error::ConvertResult;
use crate::ffmpeg::Encoder;
use crate::job::{ConversionJob, JobOutcome, JobReport};
use crate::pipeline::{self, PipelineOptions};
use crate::reveal::Reveal;
use crate::scan::{discover_inputs, ensure_dir_exists};

/// Outcome of a whole run, in discovery order
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub format: String,
    pub empty_input: bool,
    pub reports: Vec<JobReport>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Converted))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn unsupported(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Unsupported { .. }))
    }

    fn count(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Convert every file in the input folder to `format`.
///
/// Only folder setup errors are returned; per-file problems are recorded in
/// the summary and never stop the remaining files.
pub async fn run_batch<E: Encoder>(
    encoder: Arc<E>,
    cfg: &ConverterConfig,
    format: &str,
    revealer: &dyn Reveal,
) -> ConvertResult<BatchSummary> {
    ensure_dir_exists(&cfg.input_dir)?;
    ensure_dir_exists(&cfg.output_dir)?;
    ensure_dir_exists(&cfg.work_dir)?;

    let inputs = discover_inputs(&cfg.input_dir)?;
    let mut summary = BatchSummary {
        format: format.to_string(),
        ..Default::default()
    };

    if inputs.is_empty() {
        info!("The Input folder is empty.");
        summary.empty_input = true;
        if cfg.reveal_empty_input {
            if let Err(e) = revealer.reveal(&cfg.input_dir) {
                warn!("Could not open {}: {:#}", cfg.input_dir.display(), e);
            }
        }
        return Ok(summary);
    }

    let jobs: Vec<ConversionJob> = inputs
        .iter()
        .map(|input| ConversionJob::new(input, &cfg.output_dir, &cfg.work_dir, format))
        .collect();

    let workers = cfg.jobs.max(1);
    info!("Converting {} file(s) to {} ({} at a time)", jobs.len(), format, workers);

    let options = PipelineOptions::from_config(cfg);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    // Two inputs sharing a stem (clip.avi, clip.mov) map to the same output;
    // only the first one is converted, since ffmpeg runs with -y
    let writes_output = resolve_profile(format).is_ok();
    let mut claimed: HashMap<&Path, &Path> = HashMap::new();
    let mut slots: Vec<Option<JobReport>> = vec![None; jobs.len()];

    for (idx, job) in jobs.iter().enumerate() {
        if writes_output {
            if let Some(first) = claimed.get(job.output_path.as_path()) {
                let reason = format!(
                    "duplicate output {} already produced by {}",
                    job.output_path.display(),
                    first.display()
                );
                warn!("Skipping {}: {}", job.input_path.display(), reason);
                slots[idx] = Some(failed_report(job, reason));
                continue;
            }
            claimed.insert(job.output_path.as_path(), job.input_path.as_path());
        }

        // Waiting here keeps at most `workers` jobs alive and starts them in order
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(e) => {
                error!("Worker pool closed unexpectedly: {}", e);
                break;
            }
        };

        info!("Converting {} to {}...", job.input_path.display(), job.output_path.display());
        let encoder = Arc::clone(&encoder);
        let job = job.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let report = pipeline::convert(encoder.as_ref(), &job, &options).await;
            (idx, report)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, report)) => slots[idx] = Some(report),
            Err(e) => error!("Conversion task ended abnormally: {}", e),
        }
    }

    summary.reports = slots
        .into_iter()
        .zip(jobs.iter())
        .map(|(slot, job)| slot.unwrap_or_else(|| failed_report(job, "conversion task did not complete".to_string())))
        .collect();

    Ok(summary)
}

fn failed_report(job: &ConversionJob, reason: String) -> JobReport {
    let now = Utc::now();
    JobReport {
        input: job.input_path.clone(),
        output: job.output_path.clone(),
        format: job.format.clone(),
        outcome: JobOutcome::Failed {
            errors: vec![reason],
        },
        started_at: now,
        finished_at: now,
    }
}
