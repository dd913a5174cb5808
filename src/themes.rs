//! Theme discovery from the branch naming convention.
//!
//! A remote branch is a theme when its name ends with the theme suffix
//! (`-theme` by default). The short theme name is the branch name with the
//! remote prefix and the suffix removed, so `upstream/classic-theme` is the
//! `classic` theme.

use crate::error::ThemeError;
use crate::vcs::RemoteRef;
use serde::Serialize;

/// Requested theme name meaning "every discovered theme"
pub const ALL_THEMES: &str = "all";

/// How theme names are derived from remote refs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeNaming {
    pub remote_name: String,
    pub suffix: String,
}

impl ThemeNaming {
    pub fn new<R: ToString, S: ToString>(remote_name: R, suffix: S) -> ThemeNaming {
        ThemeNaming {
            remote_name: remote_name.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Strip the remote namespace and the theme suffix from a ref's short name
    pub fn theme_name_of(&self, reference: &RemoteRef) -> String {
        let name = reference.short_name.as_str();
        let name = name
            .strip_prefix(self.remote_name.as_str())
            .and_then(|n| n.strip_prefix('/'))
            .unwrap_or(name);
        name.strip_suffix(self.suffix.as_str())
            .unwrap_or(name)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: String,
    pub reference: RemoteRef,
}

/// Every theme discovered from the remote refs of one run
#[derive(Debug, Default)]
pub struct ThemeRegistry {
    themes: Vec<Theme>,
}

impl ThemeRegistry {
    /// Build the registry from theme refs, keeping their enumeration order
    pub fn from_refs(refs: Vec<RemoteRef>, naming: &ThemeNaming) -> ThemeRegistry {
        let themes = refs
            .into_iter()
            .map(|reference| Theme {
                name: naming.theme_name_of(&reference),
                reference,
            })
            .collect();
        ThemeRegistry { themes }
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn all_theme_names(&self) -> Vec<&str> {
        self.themes.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.themes.iter().any(|t| t.name == name)
    }

    /// Check every requested name, reporting all unknown ones at once
    pub fn validate<S: AsRef<str>>(&self, requested: &[S]) -> Result<(), ThemeError> {
        if selects_all(requested) {
            return Ok(());
        }

        let invalid: Vec<String> = requested
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !self.contains(name))
            .map(ToString::to_string)
            .collect();

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ThemeError::InvalidTheme {
                invalid,
                valid: self
                    .all_theme_names()
                    .into_iter()
                    .map(ToString::to_string)
                    .collect(),
            })
        }
    }
}

fn selects_all<S: AsRef<str>>(requested: &[S]) -> bool {
    requested.iter().any(|name| name.as_ref() == ALL_THEMES)
}

/// Whether `theme` is part of the requested selection
pub fn is_selected<S: AsRef<str>>(theme: &Theme, requested: &[S]) -> bool {
    selects_all(requested) || requested.iter().any(|name| name.as_ref() == theme.name)
}
