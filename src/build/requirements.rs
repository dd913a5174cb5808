//! Merged requirements listing covering every theme.
//!
//! Each theme branch adds its own packages to the base requirements file. The
//! listing pulls in the base file and appends every theme's additions so a
//! single install prepares the environment for all theme builds.

use crate::settings::Settings;
use crate::themes::ThemeRegistry;
use crate::vcs::BranchDiff;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Collect the requirement additions of every theme under the base header
pub fn merged_requirements<D: BranchDiff>(
    settings: &Settings,
    registry: &ThemeRegistry,
    diffs: &D,
) -> Result<String> {
    let requirements_file = settings.doc_file_in_repo(&settings.paths.requirements_file);

    let progress = ProgressBar::new(registry.themes().len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("can parse progress style")
            .progress_chars("#>-"),
    );

    let mut listing = format!("{}\n", settings.build.requirements_header);
    for theme in registry.themes() {
        progress.set_message(theme.name.clone());
        listing.push_str(
            &diffs
                .added_lines(&theme.reference, &requirements_file)
                .with_context(|| format!("Failed to read requirements of {}", theme.name))?,
        );
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(listing)
}

/// Write the merged requirements listing, returning where it went
pub fn generate_requirements<D: BranchDiff>(
    settings: &Settings,
    registry: &ThemeRegistry,
    diffs: &D,
) -> Result<PathBuf> {
    let listing = merged_requirements(settings, registry, diffs)?;

    let path = settings.requirements_out();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, listing)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::themes::ThemeNaming;
    use crate::vcs::RemoteRef;

    struct Requirements;

    impl BranchDiff for Requirements {
        fn added_lines(&self, reference: &RemoteRef, file_path: &str) -> Result<String> {
            assert_eq!(file_path, "doc/requirements.txt");
            Ok(match reference.short_name.as_str() {
                "upstream/press-theme" => "sphinx-press-theme\n".to_string(),
                "upstream/book-theme" => "sphinx-book-theme\npydata-sphinx-theme\n".to_string(),
                _ => String::new(),
            })
        }
    }

    fn registry() -> ThemeRegistry {
        let refs = ["press", "classic", "book"]
            .iter()
            .map(|name| RemoteRef::from_short_name(format!("upstream/{name}-theme")))
            .collect();
        ThemeRegistry::from_refs(refs, &ThemeNaming::new("upstream", "-theme"))
    }

    #[test]
    fn concatenates_theme_additions_under_header() {
        let listing = merged_requirements(&Settings::default(), &registry(), &Requirements)
            .expect("can merge");
        assert_eq!(
            listing,
            "-r ../doc/requirements.txt\nsphinx-press-theme\nsphinx-book-theme\npydata-sphinx-theme\n"
        );
    }

    #[test]
    fn writes_listing_to_configured_path() {
        let root = tempfile::tempdir().expect("can create temp dir");
        let mut settings = Settings::default();
        settings.paths.root = root.path().to_path_buf();

        let path = generate_requirements(&settings, &registry(), &Requirements)
            .expect("can generate");
        assert_eq!(path, root.path().join("dev_utils/requirements_themes.txt"));
        assert!(std::fs::read_to_string(path)
            .expect("can read")
            .starts_with("-r ../doc/requirements.txt\n"));
    }
}
