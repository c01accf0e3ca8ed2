use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use log::debug;

/// Environment variable that overrides the encoder executable path
pub const FFMPEG_BIN_ENV: &str = "FFMPEG_BIN";

/// Configuration for a batch conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Directory scanned (non-recursively) for input files
    pub input_dir: PathBuf,
    /// Directory receiving `<stem>.<format>` outputs
    pub output_dir: PathBuf,
    /// Directory where `intermediate_<name>.mkv` files are written
    pub work_dir: PathBuf,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Per-stage timeout; `None` waits forever
    pub stage_timeout_secs: Option<u64>,
    /// Maximum number of files converted at the same time
    pub jobs: usize,
    /// Run the transcode stage even if the stabilize stage failed
    pub transcode_after_failed_stabilize: bool,
    /// Open the input folder for the user when it is empty
    pub reveal_empty_input: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ConverterConfig {
    /// Create a default configuration matching the `Input/` + `Output/` layout
    pub fn default_config() -> Self {
        Self {
            input_dir: PathBuf::from("Input"),
            output_dir: PathBuf::from("Output"),
            work_dir: PathBuf::from("."),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            stage_timeout_secs: None,
            jobs: 1,
            transcode_after_failed_stabilize: false,
            reveal_empty_input: true,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            } else {
                debug!("Config file {} not found, using defaults", config_path.display());
            }
        }

        config.jobs = config.jobs.max(1);
        Ok(config)
    }

    /// Apply environment overrides (currently only `FFMPEG_BIN`)
    pub fn apply_env(&mut self) {
        self.apply_ffmpeg_override(std::env::var_os(FFMPEG_BIN_ENV).map(PathBuf::from));
    }

    fn apply_ffmpeg_override(&mut self, value: Option<PathBuf>) {
        if let Some(bin) = value.filter(|p| !p.as_os_str().is_empty()) {
            debug!("Using ffmpeg from {}: {}", FFMPEG_BIN_ENV, bin.display());
            self.ffmpeg_bin = bin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_folder_layout() {
        let cfg = ConverterConfig::default();
        assert_eq!(cfg.input_dir, PathBuf::from("Input"));
        assert_eq!(cfg.output_dir, PathBuf::from("Output"));
        assert_eq!(cfg.work_dir, PathBuf::from("."));
        assert_eq!(cfg.jobs, 1);
        assert!(!cfg.transcode_after_failed_stabilize);
        assert!(cfg.reveal_empty_input);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let cfg = ConverterConfig::load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap();
        assert_eq!(cfg, ConverterConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "jobs = 4\nstage_timeout_secs = 600\nffmpeg_bin = \"/opt/ffmpeg/bin/ffmpeg\"").unwrap();

        let cfg = ConverterConfig::load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.jobs, 4);
        assert_eq!(cfg.stage_timeout_secs, Some(600));
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(cfg.input_dir, PathBuf::from("Input"));
    }

    #[test]
    fn test_json_config_and_zero_jobs() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"output_dir": "out", "jobs": 0, "reveal_empty_input": false}}"#).unwrap();

        let cfg = ConverterConfig::load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.jobs, 1);
        assert!(!cfg.reveal_empty_input);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "jobs = \"many\"").unwrap();

        let err = ConverterConfig::load_config(Some(file.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_ffmpeg_override() {
        let mut cfg = ConverterConfig::default();
        cfg.apply_ffmpeg_override(Some(PathBuf::new()));
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("ffmpeg"));

        cfg.apply_ffmpeg_override(Some(PathBuf::from("/usr/local/bin/ffmpeg")));
        assert_eq!(cfg.ffmpeg_bin, PathBuf::from("/usr/local/bin/ffmpeg"));
    }
}
