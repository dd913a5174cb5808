mod mirror;
pub use mirror::*;

use anyhow::Result;
use serde::Serialize;

/// A branch on the tracked remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteRef {
    /// e.g. `refs/remotes/upstream/classic-theme`
    pub full_name: String,
    /// e.g. `upstream/classic-theme`
    pub short_name: String,
}

impl RemoteRef {
    #[cfg(test)]
    pub fn from_short_name<S: Into<String>>(short_name: S) -> RemoteRef {
        let short_name = short_name.into();
        RemoteRef {
            full_name: format!("refs/remotes/{short_name}"),
            short_name,
        }
    }
}

impl std::fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name)
    }
}

/// Source of the lines a theme branch adds to a file
pub trait BranchDiff {
    fn added_lines(&self, reference: &RemoteRef, file_path: &str) -> Result<String>;
}
