use std::path::{Path, PathBuf};
use chrono::Utc;
use humansize::{format_size, BINARY};
use log::{debug, error, info, warn};
use crate::codec::resolve_profile;
use crate::config::ConverterConfig;
use crate::error::{ConvertError, Stage};
use crate::ffmpeg::{stderr_tail, CommandBuilder, EncodeOutput, Encoder};
use crate::job::{ConversionJob, JobOutcome, JobReport};

/// Per-job behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Attempt the transcode stage even when stabilizing failed
    pub transcode_after_failed_stabilize: bool,
}

impl PipelineOptions {
    pub fn from_config(cfg: &ConverterConfig) -> Self {
        Self {
            transcode_after_failed_stabilize: cfg.transcode_after_failed_stabilize,
        }
    }
}

/// Removes the intermediate file when dropped, whatever happened to the job
struct IntermediateGuard {
    path: PathBuf,
}

impl IntermediateGuard {
    fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }
}

impl Drop for IntermediateGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed intermediate file: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove intermediate file {}: {}", self.path.display(), e),
        }
    }
}

/// Convert one file: stabilize into the intermediate, transcode, clean up.
///
/// Never fails as a whole; every problem ends up in the returned report so
/// the caller can move on to the next file.
pub async fn convert<E: Encoder>(
    encoder: &E,
    job: &ConversionJob,
    options: &PipelineOptions,
) -> JobReport {
    let started_at = Utc::now();
    let input = job.input_path.display();

    let profile = match resolve_profile(&job.format) {
        Ok(p) => p,
        Err(e) => {
            error!("Cannot convert {}: {}", input, e);
            return report(job, JobOutcome::Unsupported { reason: e.to_string() }, started_at);
        }
    };
    debug!(
        "Resolved {} -> video {} {:?}, audio {}",
        profile.format, profile.video_codec, profile.quality_flag, profile.audio_codec
    );

    let builder = CommandBuilder::new();
    let mut errors: Vec<ConvertError> = Vec::new();
    let guard = IntermediateGuard::new(&job.intermediate_path);

    let stabilize_args = builder.build_stabilize_command(&job.input_path, &job.intermediate_path);
    let stabilized = match encoder.encode(Stage::Stabilize, stabilize_args).await {
        Ok(out) => {
            log_encoder_output(Stage::Stabilize, &job.input_path, &out);
            info!(
                "Successfully re-encoded {} using FFV1 codec to {}",
                input,
                job.intermediate_path.display()
            );
            true
        }
        Err(e) => {
            error!("Error occurred while re-encoding {} using FFV1 codec: {}", input, e);
            errors.push(e);
            false
        }
    };

    if stabilized || options.transcode_after_failed_stabilize {
        let transcode_args = builder.build_transcode_command(&job.intermediate_path, &job.output_path, &profile);
        match encoder.encode(Stage::Transcode, transcode_args).await {
            Ok(out) => {
                log_encoder_output(Stage::Transcode, &job.input_path, &out);
                let size = tokio::fs::metadata(&job.output_path)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                info!(
                    "Successfully converted {} to {} ({})",
                    input,
                    job.output_path.display(),
                    format_size(size, BINARY)
                );
            }
            Err(e) => {
                error!(
                    "Error occurred while converting {} to {}: {}",
                    input,
                    job.output_path.display(),
                    e
                );
                errors.push(e);
            }
        }
    } else {
        warn!("Skipping transcode of {}: stabilize stage failed", input);
    }

    drop(guard);

    let outcome = if errors.is_empty() {
        JobOutcome::Converted
    } else {
        JobOutcome::Failed {
            errors: errors.iter().map(|e| e.to_string()).collect(),
        }
    };
    report(job, outcome, started_at)
}

/// ffmpeg prints its end-of-run stats (sizes, speed) as the last stderr lines
fn log_encoder_output(stage: Stage, input: &Path, out: &EncodeOutput) {
    debug!(
        "FFmpeg {} of {} finished with exit code {:?}:\n{}",
        stage,
        input.display(),
        out.exit_code,
        stderr_tail(&out.stderr, 4)
    );
}

fn report(job: &ConversionJob, outcome: JobOutcome, started_at: chrono::DateTime<Utc>) -> JobReport {
    JobReport {
        input: job.input_path.clone(),
        output: job.output_path.clone(),
        format: job.format.clone(),
        outcome,
        started_at,
        finished_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEncoder;
    use std::fs;

    struct Fixture {
        _tmp: tempfile::TempDir,
        job: ConversionJob,
    }

    fn fixture(format: &str) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let input_dir = tmp.path().join("Input");
        let output_dir = tmp.path().join("Output");
        fs::create_dir_all(&input_dir).unwrap();
        fs::create_dir_all(&output_dir).unwrap();
        let input = input_dir.join("clip.mov");
        fs::write(&input, b"source").unwrap();

        let job = ConversionJob::new(&input, &output_dir, tmp.path(), format);
        Fixture { _tmp: tmp, job }
    }

    #[tokio::test]
    async fn test_mp4_end_to_end() {
        let fx = fixture("mp4");
        let encoder = FakeEncoder::new();

        let report = convert(&encoder, &fx.job, &PipelineOptions::default()).await;

        assert_eq!(report.outcome, JobOutcome::Converted);
        assert!(fx.job.intermediate_path.ends_with("intermediate_clip.mov.mkv"));
        assert!(fx.job.output_path.ends_with("Output/clip.mp4"));

        let calls = encoder.calls();
        assert_eq!(calls.len(), 2);
        let (stage1, args1) = &calls[0];
        assert_eq!(*stage1, Stage::Stabilize);
        assert!(args1.contains(&"ffv1".to_string()));
        assert_eq!(args1.last().unwrap(), &fx.job.intermediate_path.to_string_lossy().to_string());

        let (stage2, args2) = &calls[1];
        assert_eq!(*stage2, Stage::Transcode);
        let joined = args2.join(" ");
        assert!(joined.contains("-c:v libx265 -crf 0"), "got: {}", joined);
        assert!(joined.contains("-c:a aac"), "got: {}", joined);
        assert_eq!(args2.last().unwrap(), &fx.job.output_path.to_string_lossy().to_string());

        assert!(fx.job.output_path.exists());
        assert!(!fx.job.intermediate_path.exists(), "intermediate must be removed");
    }

    #[tokio::test]
    async fn test_unsupported_format_never_calls_encoder() {
        let fx = fixture("xyz");
        let encoder = FakeEncoder::new();

        let report = convert(&encoder, &fx.job, &PipelineOptions::default()).await;

        assert!(matches!(report.outcome, JobOutcome::Unsupported { .. }));
        assert!(encoder.calls().is_empty());
        assert!(!fx.job.output_path.exists());
    }

    #[tokio::test]
    async fn test_transcode_failure_removes_intermediate() {
        let fx = fixture("webm");
        let encoder = FakeEncoder::new().failing(Stage::Transcode);

        let report = convert(&encoder, &fx.job, &PipelineOptions::default()).await;

        match &report.outcome {
            JobOutcome::Failed { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("transcode stage failed"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(encoder.stages(), vec![Stage::Stabilize, Stage::Transcode]);
        assert!(!fx.job.intermediate_path.exists());
    }

    #[tokio::test]
    async fn test_stabilize_failure_skips_transcode_and_cleans_partial() {
        let fx = fixture("mkv");
        let encoder = FakeEncoder::new().failing(Stage::Stabilize).with_partial_output();

        let report = convert(&encoder, &fx.job, &PipelineOptions::default()).await;

        assert!(matches!(report.outcome, JobOutcome::Failed { .. }));
        assert_eq!(encoder.stages(), vec![Stage::Stabilize]);
        assert!(!fx.job.intermediate_path.exists());
        assert!(!fx.job.output_path.exists());
    }

    #[tokio::test]
    async fn test_both_stages_fail_when_transcode_is_forced() {
        let fx = fixture("avi");
        let encoder = FakeEncoder::new()
            .failing(Stage::Stabilize)
            .failing(Stage::Transcode)
            .with_partial_output();
        let options = PipelineOptions { transcode_after_failed_stabilize: true };

        let report = convert(&encoder, &fx.job, &options).await;

        match &report.outcome {
            JobOutcome::Failed { errors } => assert_eq!(errors.len(), 2),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(encoder.stages(), vec![Stage::Stabilize, Stage::Transcode]);
        assert!(!fx.job.intermediate_path.exists());
    }

    #[tokio::test]
    async fn test_intermediate_removed_when_job_is_cancelled() {
        let fx = fixture("mp4");
        let encoder = FakeEncoder::new().with_delay(tokio::time::Duration::from_secs(30));
        fs::write(&fx.job.intermediate_path, b"left over").unwrap();

        let options = PipelineOptions::default();
        let result = tokio::time::timeout(
            tokio::time::Duration::from_millis(50),
            convert(&encoder, &fx.job, &options),
        )
        .await;

        assert!(result.is_err(), "conversion should have been cancelled");
        assert!(!fx.job.intermediate_path.exists());
    }
}
