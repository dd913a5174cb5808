//! Local mirror of the upstream repository.
//!
//! The mirror only ever fetches; it never checks anything out. Theme branches
//! are read straight from their remote-tracking refs, and each one is expected
//! to be a single commit layered on top of the base branch, so the theme's
//! changes are exactly the diff between the branch tip and its parent.

use super::{BranchDiff, RemoteRef};
use crate::error::ThemeError;
use crate::settings::RepositorySettings;
use anyhow::{anyhow, Context, Result};
use git2::{
    BranchType, Cred, CredentialType, Delta, DiffFormat, DiffOptions, FetchOptions,
    ReferenceType, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub struct Mirror {
    repo: Repository,
    remote_name: String,
    base_branch: String,
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("path", &self.repo.path())
            .field("remote_name", &self.remote_name)
            .field("base_branch", &self.base_branch)
            .finish()
    }
}

impl Mirror {
    /// Open the mirror at `path`, creating and fetching it if it doesn't exist yet
    pub fn ensure_local_mirror(path: &Path, settings: &RepositorySettings) -> Result<Mirror> {
        let (repo, fresh) = if path.join(".git").is_dir() {
            let repo = Repository::open(path).with_context(|| {
                format!("Failed to open path {} as a git repository!", path.display())
            })?;
            (repo, false)
        } else {
            log::info!("Initializing mirror repository at {}", path.display());
            std::fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory {}", path.display()))?;
            let repo = Repository::init(path).with_context(|| {
                format!("Failed to initialize git repository at {}", path.display())
            })?;
            (repo, true)
        };

        match repo.find_remote(&settings.remote_name) {
            Ok(remote) => {
                if remote.url() != Some(settings.remote_url.as_str()) {
                    log::warn!(
                        "Remote {} points at {}, not the configured {}",
                        settings.remote_name,
                        remote.url().unwrap_or("none"),
                        settings.remote_url
                    );
                }
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                repo.remote(&settings.remote_name, &settings.remote_url)
                    .with_context(|| {
                        format!(
                            "Failed to add remote {} ({})",
                            settings.remote_name, settings.remote_url
                        )
                    })?;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to look up remote {}", settings.remote_name)
                })
            }
        }

        let mirror = Mirror {
            repo,
            remote_name: settings.remote_name.clone(),
            base_branch: settings.base_branch.clone(),
        };

        if fresh {
            mirror.fetch()?;
        }
        mirror.ensure_base_branch()?;

        Ok(mirror)
    }

    fn remote_base_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote_name, self.base_branch)
    }

    /// Create a local base branch tracking the remote one, unless it exists already
    fn ensure_base_branch(&self) -> Result<()> {
        if self
            .repo
            .find_branch(&self.base_branch, BranchType::Local)
            .is_ok()
        {
            return Ok(());
        }

        let remote_base = match self.repo.find_reference(&self.remote_base_ref()) {
            Ok(r) => r,
            Err(_) => {
                log::warn!(
                    "Remote {} has no {} branch, not creating a local one",
                    self.remote_name,
                    self.base_branch
                );
                return Ok(());
            }
        };
        let commit = remote_base
            .peel_to_commit()
            .with_context(|| format!("Failed to resolve {}", self.remote_base_ref()))?;

        let mut branch = self
            .repo
            .branch(&self.base_branch, &commit, false)
            .with_context(|| format!("Failed to create branch {}", self.base_branch))?;
        branch
            .set_upstream(Some(&format!("{}/{}", self.remote_name, self.base_branch)))
            .with_context(|| format!("Failed to set upstream of {}", self.base_branch))?;
        log::debug!("Created branch {} at {}", self.base_branch, commit.id());

        Ok(())
    }

    /// Refresh every remote-tracking ref of the tracked remote
    pub fn fetch(&self) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(&self.remote_name)
            .with_context(|| format!("Failed to find remote {}", self.remote_name))?;

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("can parse progress style"),
        );
        progress.enable_steady_tick(Duration::from_millis(100));
        progress.set_message(format!("Fetching {}...", self.remote_name));

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, allowed_types| {
            if allowed_types.contains(CredentialType::SSH_KEY) {
                Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"))
            } else {
                Cred::default()
            }
        });
        callbacks.transfer_progress(|stats| {
            progress.set_message(format!(
                "Fetching {}... {}/{} objects",
                self.remote_name,
                stats.received_objects(),
                stats.total_objects()
            ));
            true
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);

        let result = remote
            .fetch(&[] as &[&str], Some(&mut options), None)
            .with_context(|| format!("Failed to fetch remote {}", self.remote_name));
        progress.finish_and_clear();
        result?;

        log::info!("Fetched {}", self.remote_name);
        Ok(())
    }

    /// Remote refs whose branch name ends with `suffix`, in enumeration order
    pub fn list_theme_refs(&self, suffix: &str) -> Result<Vec<RemoteRef>> {
        let glob = format!("refs/remotes/{}/*", self.remote_name);
        let references = self
            .repo
            .references_glob(&glob)
            .with_context(|| format!("Failed to list references matching {glob}"))?;

        let mut refs = Vec::default();
        for reference in references {
            let reference = reference.with_context(|| "Failed to read remote reference")?;
            if reference.kind() != Some(ReferenceType::Direct) {
                continue;
            }
            let (Some(full_name), Some(short_name)) = (reference.name(), reference.shorthand())
            else {
                log::warn!("Skipping remote reference with a non UTF-8 name");
                continue;
            };
            if short_name.ends_with(suffix) {
                refs.push(RemoteRef {
                    full_name: full_name.to_string(),
                    short_name: short_name.to_string(),
                });
            }
        }

        Ok(refs)
    }

    /// Lines the tip commit of `reference` adds to `file_path`, without diff markers
    pub fn extract_added_lines(&self, reference: &RemoteRef, file_path: &str) -> Result<String> {
        let tip = self
            .repo
            .find_reference(&reference.full_name)
            .with_context(|| format!("Failed to find reference {}", reference.full_name))?
            .peel_to_commit()
            .with_context(|| format!("Failed to resolve {} to a commit", reference))?;

        if tip.parent_count() == 0 {
            return Err(ThemeError::HistoryTooShort {
                reference: reference.short_name.clone(),
            }
            .into());
        }
        let base = tip
            .parent(0)
            .with_context(|| format!("Failed to find the parent of {}", tip.id()))?;
        self.check_ancestry(reference, base.id());

        let mut options = DiffOptions::new();
        options
            .context_lines(0)
            .pathspec(file_path)
            .disable_pathspec_match(true);
        let diff = self
            .repo
            .diff_tree_to_tree(
                Some(&base.tree().with_context(|| "Failed to get parent tree")?),
                Some(&tip.tree().with_context(|| "Failed to get tip tree")?),
                Some(&mut options),
            )
            .with_context(|| format!("Failed to diff {file_path} on {reference}"))?;

        let mut added: Vec<u8> = Vec::default();
        diff.print(DiffFormat::Patch, |delta, _hunk, line| {
            if delta.status() == Delta::Modified && line.origin() == '+' {
                added.extend_from_slice(line.content());
                if !line.content().ends_with(b"\n") {
                    added.push(b'\n');
                }
            }
            true
        })
        .with_context(|| format!("Failed to read diff of {file_path} on {reference}"))?;

        log::debug!(
            "{} adds {} bytes to {}",
            reference,
            added.len(),
            file_path
        );
        String::from_utf8(added)
            .map_err(|_| anyhow!("Diff of {file_path} on {reference} isn't valid UTF-8"))
    }

    /// Whether `parent` is the remote base branch tip or one of its ancestors
    fn is_on_base(&self, parent: git2::Oid) -> bool {
        let base_tip = match self
            .repo
            .find_reference(&self.remote_base_ref())
            .and_then(|r| r.peel_to_commit())
        {
            Ok(commit) => commit.id(),
            // nothing to compare against
            Err(_) => return true,
        };

        base_tip == parent
            || self
                .repo
                .graph_descendant_of(base_tip, parent)
                .unwrap_or(false)
    }

    /// Warn when the theme commit isn't layered on the remote base branch
    fn check_ancestry(&self, reference: &RemoteRef, parent: git2::Oid) {
        if !self.is_on_base(parent) {
            log::warn!(
                "{} isn't a single commit on top of {}/{}; its diff may include unrelated changes",
                reference,
                self.remote_name,
                self.base_branch
            );
        }
    }
}

impl BranchDiff for Mirror {
    fn added_lines(&self, reference: &RemoteRef, file_path: &str) -> Result<String> {
        self.extract_added_lines(reference, file_path)
    }
}
