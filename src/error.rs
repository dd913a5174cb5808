//! Domain errors raised while discovering and building themes.
//!
//! Plumbing failures (I/O, git, TOML) travel as `anyhow::Error` with context;
//! the variants here are the ones callers need to tell apart.

use crate::themes::ALL_THEMES;
use thiserror::Error;

fn bracketed(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("[{name}]"))
        .collect::<Vec<String>>()
        .join(", ")
}

fn with_all(names: &[String]) -> String {
    let mut all = vec![ALL_THEMES.to_string()];
    all.extend_from_slice(names);
    bracketed(&all)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ThemeError {
    #[error(
        "You used the following invalid theme names: {}\nThe valid theme names are: {}",
        bracketed(.invalid),
        with_all(.valid)
    )]
    InvalidTheme {
        invalid: Vec<String>,
        valid: Vec<String>,
    },

    /// Theme branches must be exactly one commit on top of their base
    #[error("Branch {reference} has no parent commit to diff against")]
    HistoryTooShort { reference: String },

    #[error("An error occurred building theme {theme} (exit status {status})")]
    Build { theme: String, status: i32 },

    #[error("Building theme {theme} was interrupted")]
    Interrupted { theme: String },
}

impl ThemeError {
    /// Whether this error should stop every remaining theme build
    pub fn is_fatal(&self) -> bool {
        matches!(self, ThemeError::Interrupted { .. })
    }
}
