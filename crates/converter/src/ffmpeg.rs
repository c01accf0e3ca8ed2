use std::future::Future;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use log::debug;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use crate::codec::CodecProfile;
use crate::config::ConverterConfig;
use crate::error::{ConvertError, ConvertResult, Stage};

/// Number of stderr lines kept in failure messages
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a finished encoder run
#[derive(Debug, Clone, Default)]
pub struct EncodeOutput {
    pub exit_code: Option<i32>,
    pub stderr: String,
}

/// Runs one encoder invocation to completion.
///
/// The pipeline only talks to this trait, so tests can substitute a
/// recording fake for the real ffmpeg process.
pub trait Encoder: Send + Sync + 'static {
    fn encode(
        &self,
        stage: Stage,
        args: Vec<String>,
    ) -> impl Future<Output = ConvertResult<EncodeOutput>> + Send;
}

/// FFmpeg version information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FFmpegVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FFmpegVersion {
    /// Parse version from FFmpeg version string
    /// Example: "ffmpeg version 6.1.1-static" -> FFmpegVersion { major: 6, minor: 1, patch: 1 }
    pub fn parse(version_str: &str) -> Result<Self> {
        let version_part = version_str
            .split_whitespace()
            .find(|s| s.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
            .ok_or_else(|| anyhow!("No version number found in: {}", version_str))?;

        // Strip build suffixes such as "-static" or "-0ubuntu1"
        let numeric: String = version_part
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let mut parts = numeric.split('.').filter(|p| !p.is_empty());

        let major = parts
            .next()
            .ok_or_else(|| anyhow!("Invalid version format: {}", version_str))?
            .parse::<u32>()
            .with_context(|| format!("Failed to parse major version from: {}", version_part))?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u32>()
                .with_context(|| format!("Failed to parse minor version from: {}", p))?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse::<u32>()
                .with_context(|| format!("Failed to parse patch version from: {}", p))?,
            None => 0,
        };

        Ok(FFmpegVersion { major, minor, patch })
    }
}

impl std::fmt::Display for FFmpegVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Spawns the ffmpeg binary directly, one process per stage
#[derive(Debug, Clone)]
pub struct FFmpegEncoder {
    pub ffmpeg_bin: PathBuf,
    pub timeout_secs: Option<u64>,
}

impl FFmpegEncoder {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, timeout_secs: Option<u64>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            timeout_secs,
        }
    }

    pub fn from_config(cfg: &ConverterConfig) -> Self {
        Self::new(cfg.ffmpeg_bin.clone(), cfg.stage_timeout_secs)
    }

    /// Query `ffmpeg -version`
    pub async fn detect_version(&self) -> Result<FFmpegVersion> {
        let output = Command::new(&self.ffmpeg_bin)
            .arg("-version")
            .output()
            .await
            .with_context(|| format!("Failed to execute FFmpeg at: {}", self.ffmpeg_bin.display()))?;

        if !output.status.success() {
            return Err(anyhow!("FFmpeg version check failed"));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let first_line = stdout.lines().next()
            .ok_or_else(|| anyhow!("Empty output from FFmpeg -version"))?;

        FFmpegVersion::parse(first_line)
    }
}

impl Encoder for FFmpegEncoder {
    async fn encode(&self, stage: Stage, args: Vec<String>) -> ConvertResult<EncodeOutput> {
        let cmd_str = format!("{} {}", self.ffmpeg_bin.display(), args.join(" "));
        debug!("Executing FFmpeg ({}): {}", stage, cmd_str);

        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(&args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ConvertError::EncodeFailure {
            stage,
            reason: format!(
                "failed to spawn FFmpeg at {}: {}. Ensure FFmpeg is installed and accessible.",
                self.ffmpeg_bin.display(),
                e
            ),
        })?;

        let stderr_handle = child.stderr.take().map(|err| tokio::spawn(collect_output(err)));

        let wait_result = match self.timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill timed-out FFmpeg process: {}", e);
                    }
                    return Err(ConvertError::Timeout { stage, secs });
                }
            },
            None => child.wait().await,
        };

        let status = wait_result.map_err(|e| ConvertError::EncodeFailure {
            stage,
            reason: format!("failed to wait for FFmpeg process: {}", e),
        })?;

        let stderr = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        let exit_code = status.code();
        debug!("FFmpeg ({}) exit code: {:?}, stderr length: {}", stage, exit_code, stderr.len());

        if !status.success() {
            return Err(ConvertError::EncodeFailure {
                stage,
                reason: format!(
                    "exit code {}\nCommand: {}\nSTDERR:\n{}",
                    exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none (terminated by signal)".to_string()),
                    cmd_str,
                    stderr_tail(&stderr, STDERR_TAIL_LINES)
                ),
            });
        }

        Ok(EncodeOutput { exit_code, stderr })
    }
}

/// Drain a pipe to EOF; bytes that are not UTF-8 (e.g. Latin-1 file names) are replaced
async fn collect_output<R>(mut reader: R) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf).await {
        debug!("Stopped reading FFmpeg output early: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Last `max_lines` lines of an ffmpeg log
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Command builder for the two encoder invocations
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandBuilder;

impl CommandBuilder {
    /// Create a new command builder
    pub fn new() -> Self {
        CommandBuilder
    }

    /// Arguments common to both stages: never read stdin, overwrite outputs
    fn base_args(input: &Path) -> Vec<String> {
        vec![
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    /// Build the stabilize command: lossless FFV1 into the intermediate
    ///
    /// Every frame is a keyframe (`-g 1`), split into 24 slices with
    /// per-slice CRC; audio is copied untouched.
    pub fn build_stabilize_command(&self, input: &Path, intermediate: &Path) -> Vec<String> {
        let mut args = Self::base_args(input);

        args.push("-c:v".to_string());
        args.push("ffv1".to_string());
        args.push("-async".to_string());
        args.push("1".to_string());
        args.push("-level".to_string());
        args.push("3".to_string());
        args.push("-coder".to_string());
        args.push("1".to_string());
        args.push("-context".to_string());
        args.push("1".to_string());
        args.push("-g".to_string());
        args.push("1".to_string());
        args.push("-slices".to_string());
        args.push("24".to_string());
        args.push("-slicecrc".to_string());
        args.push("1".to_string());
        args.push("-b:v".to_string());
        args.push("0".to_string());

        args.push("-c:a".to_string());
        args.push("copy".to_string());

        args.push("-row-mt".to_string());
        args.push("1".to_string());

        args.push(intermediate.to_string_lossy().to_string());
        args
    }

    /// Build the transcode command from the intermediate into the final format
    pub fn build_transcode_command(
        &self,
        intermediate: &Path,
        output: &Path,
        profile: &CodecProfile,
    ) -> Vec<String> {
        let mut args = Self::base_args(intermediate);

        args.push("-c:v".to_string());
        args.push(profile.video_codec.to_string());
        args.extend(profile.quality_args());
        args.push("-async".to_string());
        args.push("1".to_string());
        args.push("-b:v".to_string());
        args.push("0".to_string());

        args.push("-c:a".to_string());
        args.push(profile.audio_codec.to_string());

        // First video stream, first audio stream if there is one
        args.push("-map".to_string());
        args.push("0:v:0".to_string());
        args.push("-map".to_string());
        args.push("0:a:0?".to_string());
        args.push("-map_metadata".to_string());
        args.push("0".to_string());

        args.push("-row-mt".to_string());
        args.push("1".to_string());

        args.push(output.to_string_lossy().to_string());
        args
    }
}
