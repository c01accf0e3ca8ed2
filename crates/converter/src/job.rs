use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Container extension of the lossless intermediate
pub const INTERMEDIATE_EXTENSION: &str = "mkv";

/// Paths involved in converting one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub intermediate_path: PathBuf,
    /// Requested output format, as typed by the user
    pub format: String,
}

impl ConversionJob {
    /// Derive output and intermediate paths for `input`.
    ///
    /// Output: `<output_dir>/<stem>.<format>`.
    /// Intermediate: `<work_dir>/intermediate_<file name>.mkv`, unique per input name.
    pub fn new(input: &Path, output_dir: &Path, work_dir: &Path, format: &str) -> Self {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            input_path: input.to_path_buf(),
            output_path: output_dir.join(format!("{}.{}", stem, format)),
            intermediate_path: work_dir.join(format!("intermediate_{}.{}", file_name, INTERMEDIATE_EXTENSION)),
            format: format.to_string(),
        }
    }
}

/// Final state of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Converted,
    Unsupported { reason: String },
    Failed { errors: Vec<String> },
}

/// Record of one job, kept for the end-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: String,
    #[serde(flatten)]
    pub outcome: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
