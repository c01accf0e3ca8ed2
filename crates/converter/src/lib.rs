pub mod config;
pub mod error;
pub mod codec;
pub mod scan;
pub mod reveal;
pub mod ffmpeg;
pub mod job;
pub mod pipeline;
pub mod batch;

#[cfg(test)]
mod testing;

pub use config::ConverterConfig;
pub use error::{ConvertError, ConvertResult, Stage};
pub use codec::{CodecProfile, SUPPORTED_FORMATS};
pub use job::{ConversionJob, JobOutcome, JobReport};
pub use ffmpeg::{Encoder, FFmpegEncoder};
pub use batch::{run_batch, BatchSummary};
