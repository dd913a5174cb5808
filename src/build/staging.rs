//! The staged copy of the shared documentation tree.
//!
//! Staging always starts from scratch: the previous copy is deleted and the
//! shared source copied again, so nothing from an earlier run survives. Every
//! theme build afterwards reuses the same copy and only rewrites its build
//! configuration file.

use anyhow::{Context, Result};
use globset::GlobSet;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Exclusively owned handle to the staged documentation tree
#[derive(Debug)]
pub struct StagedTree {
    doc_dir: PathBuf,
    conf_file: PathBuf,
}

impl StagedTree {
    /// Recreate `staged` from `source`, then copy `ancillary` files next to it
    pub fn stage<I>(
        source: &Path,
        staged: &Path,
        conf_file: &Path,
        ancillary: I,
        exclude: GlobSet,
    ) -> Result<StagedTree>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        if staged.exists() {
            std::fs::remove_dir_all(staged)
                .with_context(|| format!("Failed to remove {}", staged.display()))?;
        }
        copy_tree(source, staged, exclude)?;

        let parent = staged.parent().unwrap_or(staged);
        for file in ancillary {
            let name = file
                .file_name()
                .with_context(|| format!("{} has no file name", file.display()))?;
            std::fs::copy(&file, parent.join(name))
                .with_context(|| format!("Failed to copy {}", file.display()))?;
        }

        log::info!("Staged {} at {}", source.display(), staged.display());
        Ok(StagedTree {
            doc_dir: staged.to_path_buf(),
            conf_file: staged.join(conf_file),
        })
    }

    pub fn doc_dir(&self) -> &Path {
        &self.doc_dir
    }

    /// Replace the staged build configuration
    pub fn write_config(&mut self, contents: &str) -> Result<()> {
        std::fs::write(&self.conf_file, contents)
            .with_context(|| format!("Failed to write {}", self.conf_file.display()))
    }
}

fn copy_tree(source: &Path, destination: &Path, exclude: GlobSet) -> Result<()> {
    if !source.is_dir() {
        return Err(anyhow::anyhow!(
            "Documentation path {} isn't a directory!",
            source.display()
        ));
    }

    let root = source.to_path_buf();
    let walk = WalkBuilder::new(source)
        .standard_filters(false)
        .filter_entry(move |entry| match entry.path().strip_prefix(&root) {
            Ok(relative) => relative.as_os_str().is_empty() || !exclude.is_match(relative),
            Err(_) => true,
        })
        .build();

    for entry in walk {
        let entry = entry.with_context(|| "Failed to walk documentation directory")?;
        let relative = entry.path().strip_prefix(source).with_context(|| {
            format!(
                "Failed to remove root {} from path {}",
                source.display(),
                entry.path().display()
            )
        })?;
        let target = destination.join(relative);

        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }

    Ok(())
}
