use std::path::Path;
use std::process::{Command, Stdio};
use anyhow::{Context, Result};
use log::info;

/// Shows a folder to the user (file explorer, Finder, ...).
pub trait Reveal: Send + Sync {
    fn reveal(&self, path: &Path) -> Result<()>;
}

/// Opens the folder with the platform's file manager, without waiting for it
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRevealer;

impl SystemRevealer {
    fn opener() -> &'static str {
        if cfg!(target_os = "windows") {
            "explorer"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

impl Reveal for SystemRevealer {
    fn reveal(&self, path: &Path) -> Result<()> {
        let opener = Self::opener();
        Command::new(opener)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch {} for: {}", opener, path.display()))?;
        Ok(())
    }
}

/// Only logs the folder location; used on headless systems and in tests
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyRevealer;

impl Reveal for LogOnlyRevealer {
    fn reveal(&self, path: &Path) -> Result<()> {
        info!("Place media files in: {}", path.display());
        Ok(())
    }
}
