use anyhow::Result;
use derive_builder::Builder;
use std::path::{Path, PathBuf};

mod orchestrator;
pub use orchestrator::*;

mod requirements;
pub use requirements::*;

mod sphinx;
pub use sphinx::*;

mod staging;
pub use staging::*;

/// Option forcing the build tool to write every output file
pub const WRITE_ALL_OPTION: &str = "-a";

/// Option introducing the doctree (build cache) directory
pub const CACHE_DIR_OPTION: &str = "-d";

/// What the documentation build tool reported for one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Failed(i32),
    Interrupted,
}

impl BuildStatus {
    pub fn from_code(code: i32) -> BuildStatus {
        match code {
            0 => BuildStatus::Success,
            // 128 + SIGINT, as shells report it
            130 => BuildStatus::Interrupted,
            code => BuildStatus::Failed(code),
        }
    }
}

/// A documentation build tool: builds `source` into `destination`
pub trait BuildTool {
    fn build(&self, source: &Path, destination: &Path, options: &[String]) -> Result<BuildStatus>;
}

/// Where a theme build is in its lifecycle
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    #[default]
    Pending,
    ConfigMaterialized,
    Building,
    Succeeded,
    Failed,
    Aborted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "pending"),
            JobState::ConfigMaterialized => write!(f, "config materialized"),
            JobState::Building => write!(f, "building"),
            JobState::Succeeded => write!(f, "succeeded"),
            JobState::Failed => write!(f, "failed"),
            JobState::Aborted => write!(f, "aborted"),
        }
    }
}

/// One theme build submitted to the build tool
#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct BuildJob {
    pub theme: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    #[builder(setter(each(name = "option", into)), default)]
    pub options: Vec<String>,
    #[builder(default)]
    pub state: JobState,
}

impl BuildJob {
    pub fn transition(&mut self, state: JobState) {
        log::debug!("{}: {} -> {}", self.theme, self.state, state);
        self.state = state;
    }

    /// Run the job, leaving it in a terminal state
    pub fn run<T: BuildTool + ?Sized>(&mut self, tool: &T) -> Result<BuildStatus> {
        self.transition(JobState::Building);
        let status = match tool.build(&self.source, &self.destination, &self.options) {
            Ok(status) => status,
            Err(e) => {
                self.transition(JobState::Failed);
                return Err(e);
            }
        };
        self.transition(match status {
            BuildStatus::Success => JobState::Succeeded,
            BuildStatus::Failed(_) => JobState::Failed,
            BuildStatus::Interrupted => JobState::Aborted,
        });
        Ok(status)
    }
}
