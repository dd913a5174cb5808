//! Project configuration loaded from `theme-builder.toml`.
//!
//! Every field has a default matching the conventional layout of a Sphinx
//! extension repository, so the tool runs without a configuration file and a
//! partial file only needs to name what differs.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "theme-builder.toml";

/// Complete configuration for a theme-builder project.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub repository: RepositorySettings,
    pub paths: PathSettings,
    pub build: BuildSettings,
    /// Per-theme capability overrides, keyed by short theme name
    pub themes: BTreeMap<String, ThemeCapabilities>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositorySettings {
    pub remote_name: String,
    pub remote_url: String,
    pub base_branch: String,
    /// Branches whose name ends with this marker are themes
    pub theme_suffix: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        RepositorySettings {
            remote_name: "upstream_diff_repo".to_string(),
            remote_url: "git@github.com:spatialaudio/nbsphinx.git".to_string(),
            base_branch: "master".to_string(),
            theme_suffix: "-theme".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    /// Repository root every other path is relative to
    pub root: PathBuf,
    pub doc_dir: PathBuf,
    /// Scratch directory holding the local mirror and the staged tree
    pub work_dir: PathBuf,
    pub build_root: PathBuf,
    pub requirements_out: PathBuf,
    /// Build configuration file, relative to `doc_dir`
    pub conf_file: PathBuf,
    /// Base requirements file, relative to `doc_dir`
    pub requirements_file: PathBuf,
    /// Root-level files copied next to the staged tree
    pub ancillary_files: Vec<PathBuf>,
    /// Globs (relative to `doc_dir`) left out of the staged tree
    pub exclude: Vec<String>,
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            root: PathBuf::from("."),
            doc_dir: PathBuf::from("doc"),
            work_dir: PathBuf::from("dev_utils/tmp"),
            build_root: PathBuf::from("dev_utils/_build"),
            requirements_out: PathBuf::from("dev_utils/requirements_themes.txt"),
            conf_file: PathBuf::from("conf.py"),
            requirements_file: PathBuf::from("requirements.txt"),
            ancillary_files: vec![
                PathBuf::from("README.rst"),
                PathBuf::from("CONTRIBUTING.rst"),
            ],
            exclude: vec!["_build".to_string(), "_build/**".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Documentation build executable
    pub command: String,
    /// Extra options passed to every theme build
    pub args: Vec<String>,
    /// First line of the merged requirements listing
    pub requirements_header: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            command: "sphinx-build".to_string(),
            args: Vec::default(),
            requirements_header: "-r ../doc/requirements.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThemeCapabilities {
    /// Whether the theme can share the build cache with the others
    pub shared_cache: bool,
}

impl Default for ThemeCapabilities {
    fn default() -> Self {
        ThemeCapabilities { shared_cache: true }
    }
}

impl Default for Settings {
    fn default() -> Self {
        // these themes' builds break when reusing another theme's doctrees
        let themes = ["guzzle", "press"]
            .into_iter()
            .map(|theme| (theme.to_string(), ThemeCapabilities { shared_cache: false }))
            .collect();

        Settings {
            repository: RepositorySettings::default(),
            paths: PathSettings::default(),
            build: BuildSettings::default(),
            themes,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to the defaults when the file doesn't exist
    pub fn load(path: &Path) -> Result<Settings> {
        if !path.exists() {
            log::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to load {} contents", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn capabilities(&self, theme: &str) -> ThemeCapabilities {
        self.themes.get(theme).copied().unwrap_or_default()
    }

    fn rooted(&self, path: &Path) -> PathBuf {
        self.paths.root.join(path)
    }

    pub fn doc_dir(&self) -> PathBuf {
        self.rooted(&self.paths.doc_dir)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.rooted(&self.paths.work_dir)
    }

    /// Where the shared documentation source gets staged
    pub fn staged_doc_dir(&self) -> PathBuf {
        let name = self
            .paths
            .doc_dir
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("doc"));
        self.work_dir().join(name)
    }

    pub fn shared_cache_dir(&self) -> PathBuf {
        self.work_dir().join("shared_build_cache")
    }

    pub fn theme_build_dir(&self, theme: &str) -> PathBuf {
        self.rooted(&self.paths.build_root).join(theme)
    }

    pub fn requirements_out(&self) -> PathBuf {
        self.rooted(&self.paths.requirements_out)
    }

    pub fn ancillary_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.paths.ancillary_files.iter().map(|f| self.rooted(f))
    }

    /// Repository-relative path of a file inside the doc dir, as git expects it
    pub fn doc_file_in_repo(&self, file: &Path) -> String {
        self.paths
            .doc_dir
            .join(file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .filter(|c| c != ".")
            .collect::<Vec<String>>()
            .join("/")
    }

    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in self.paths.exclude.iter() {
            builder.add(
                Glob::new(pattern)
                    .with_context(|| format!("Invalid glob pattern: {}", pattern))?,
            );
        }
        builder.build().with_context(|| "Failed to compile exclude globs")
    }
}
