use super::{BuildStatus, BuildTool};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runs an external `sphinx-build` compatible executable
#[derive(Debug, Clone)]
pub struct SphinxBuild {
    command: String,
    interrupted: Arc<AtomicBool>,
}

impl SphinxBuild {
    /// `interrupted` is raised by the process' Ctrl-C handler
    pub fn new<S: Into<String>>(command: S, interrupted: Arc<AtomicBool>) -> SphinxBuild {
        SphinxBuild {
            command: command.into(),
            interrupted,
        }
    }
}

impl BuildTool for SphinxBuild {
    fn build(&self, source: &Path, destination: &Path, options: &[String]) -> Result<BuildStatus> {
        if self.interrupted.load(Ordering::SeqCst) {
            log::debug!("Interrupted before building {}", destination.display());
            return Ok(BuildStatus::Interrupted);
        }

        log::debug!(
            "Running {} {} {} {}",
            self.command,
            options.join(" "),
            source.display(),
            destination.display()
        );

        let status = Command::new(&self.command)
            .args(options)
            .arg(source)
            .arg(destination)
            .status()
            .with_context(|| format!("Failed to run {}", self.command))?;

        if self.interrupted.load(Ordering::SeqCst) {
            return Ok(BuildStatus::Interrupted);
        }

        // no exit code means the build was killed by a signal
        Ok(status
            .code()
            .map(BuildStatus::from_code)
            .unwrap_or(BuildStatus::Interrupted))
    }
}
