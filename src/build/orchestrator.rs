//! Builds theme branches one after the other against the staged tree.
//!
//! Themes are built sequentially because they all share the one staged tree
//! and overwrite its configuration file. A failing theme is reported and the
//! loop moves on; an interrupted build stops everything that's left.

use super::{BuildJobBuilder, BuildStatus, BuildTool, JobState, StagedTree};
use super::{CACHE_DIR_OPTION, WRITE_ALL_OPTION};
use crate::error::ThemeError;
use crate::settings::Settings;
use crate::themes::{is_selected, Theme, ThemeRegistry};
use crate::vcs::BranchDiff;
use anyhow::{Context, Result};

/// Final state of one theme after a run
#[derive(Debug)]
pub struct ThemeOutcome {
    pub theme: String,
    pub state: JobState,
    pub error: Option<anyhow::Error>,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub outcomes: Vec<ThemeOutcome>,
}

impl BuildReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ThemeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == JobState::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ThemeOutcome> {
        self.outcomes.iter().filter(|o| o.state == JobState::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    /// The theme whose interrupted build stopped the run, if any
    pub fn aborted(&self) -> Option<&ThemeOutcome> {
        self.outcomes.iter().find(|o| o.state == JobState::Aborted)
    }
}

pub struct Orchestrator<'a, D: BranchDiff, T: BuildTool> {
    settings: &'a Settings,
    registry: &'a ThemeRegistry,
    diffs: &'a D,
    tool: &'a T,
    global_options: Vec<String>,
}

impl<'a, D: BranchDiff, T: BuildTool> Orchestrator<'a, D, T> {
    pub fn new(
        settings: &'a Settings,
        registry: &'a ThemeRegistry,
        diffs: &'a D,
        tool: &'a T,
    ) -> Orchestrator<'a, D, T> {
        Orchestrator {
            settings,
            registry,
            diffs,
            tool,
            global_options: settings.build.args.clone(),
        }
    }

    /// Make every build rewrite all of its output files
    pub fn write_all(mut self, write_all: bool) -> Self {
        if write_all && !self.global_options.iter().any(|o| o == WRITE_ALL_OPTION) {
            self.global_options.push(WRITE_ALL_OPTION.to_string());
        }
        self
    }

    pub fn stage_shared_tree(&self) -> Result<StagedTree> {
        StagedTree::stage(
            &self.settings.doc_dir(),
            &self.settings.staged_doc_dir(),
            &self.settings.paths.conf_file,
            self.settings.ancillary_files(),
            self.settings.exclude_set()?,
        )
        .with_context(|| "Failed to stage the shared documentation tree")
    }

    /// Write the base configuration plus the theme's additions into the staged tree
    pub fn materialize_theme_config(&self, tree: &mut StagedTree, theme: &Theme) -> Result<()> {
        let conf_file = &self.settings.paths.conf_file;
        let base_path = self.settings.doc_dir().join(conf_file);
        let base = std::fs::read_to_string(&base_path)
            .with_context(|| format!("Failed to read {}", base_path.display()))?;
        let additions = self
            .diffs
            .added_lines(&theme.reference, &self.settings.doc_file_in_repo(conf_file))?;

        tree.write_config(&(base + &additions))
    }

    /// Options for one theme: global ones, then the shared cache unless the theme can't use it
    pub fn build_options(&self, theme: &str) -> Vec<String> {
        let mut options = self.global_options.clone();
        if self.settings.capabilities(theme).shared_cache {
            options.push(CACHE_DIR_OPTION.to_string());
            options.push(self.settings.shared_cache_dir().to_string_lossy().to_string());
        } else {
            log::debug!("{theme} doesn't use the shared build cache");
        }
        options
    }

    pub fn build_theme(&self, tree: &mut StagedTree, theme: &Theme) -> Result<()> {
        println!();
        println!("{}", console::style("#".repeat(80)).cyan());
        let title = format!("BUILDING THEME: {}", theme.name.to_uppercase());
        println!(
            "{} {} {}",
            console::style("#").cyan(),
            console::style(format!("{title:^76}")).bold(),
            console::style("#").cyan()
        );
        println!("{}", console::style("#".repeat(80)).cyan());

        let mut job = BuildJobBuilder::default()
            .theme(theme.name.as_str())
            .source(tree.doc_dir())
            .destination(self.settings.theme_build_dir(&theme.name))
            .options(self.build_options(&theme.name))
            .build()
            .with_context(|| "Failed to build job")?;

        if let Err(e) = self.materialize_theme_config(tree, theme) {
            job.transition(JobState::Failed);
            return Err(e.context(format!("Failed to prepare configuration of {}", theme.name)));
        }
        job.transition(JobState::ConfigMaterialized);

        match job.run(self.tool)? {
            BuildStatus::Success => Ok(()),
            BuildStatus::Failed(status) => Err(ThemeError::Build {
                theme: theme.name.clone(),
                status,
            }
            .into()),
            BuildStatus::Interrupted => Err(ThemeError::Interrupted {
                theme: theme.name.clone(),
            }
            .into()),
        }
    }

    /// Validate `requested`, stage once, then build every selected theme.
    ///
    /// An interrupted build ends the loop; its theme is the report's last
    /// outcome, marked `Aborted`, and later themes aren't listed at all.
    pub fn build_themes<S: AsRef<str>>(&self, requested: &[S]) -> Result<BuildReport> {
        self.registry.validate(requested)?;
        let mut tree = self.stage_shared_tree()?;

        let mut report = BuildReport::default();
        for theme in self.registry.themes() {
            if !is_selected(theme, requested) {
                continue;
            }

            match self.build_theme(&mut tree, theme) {
                Ok(()) => {
                    log::info!("Built {}", theme.name);
                    report.outcomes.push(ThemeOutcome {
                        theme: theme.name.clone(),
                        state: JobState::Succeeded,
                        error: None,
                    });
                }
                Err(e) if is_fatal(&e) => {
                    log::error!("{e:#}, skipping the remaining themes");
                    report.outcomes.push(ThemeOutcome {
                        theme: theme.name.clone(),
                        state: JobState::Aborted,
                        error: Some(e),
                    });
                    break;
                }
                Err(e) => {
                    log::error!("{e:#}");
                    report.outcomes.push(ThemeOutcome {
                        theme: theme.name.clone(),
                        state: JobState::Failed,
                        error: Some(e),
                    });
                }
            }
        }

        Ok(report)
    }
}

fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ThemeError>()
        .map(ThemeError::is_fatal)
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::themes::ThemeNaming;
    use crate::vcs::RemoteRef;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const BASE_CONF: &str = "project = 'docs'\n";

    #[derive(Default)]
    struct FakeDiffs {
        additions: HashMap<(String, String), String>,
        broken: Vec<String>,
    }

    impl FakeDiffs {
        fn add(mut self, branch: &str, file: &str, lines: &str) -> Self {
            self.additions.insert(
                (format!("upstream/{branch}"), file.to_string()),
                lines.to_string(),
            );
            self
        }
    }

    impl BranchDiff for FakeDiffs {
        fn added_lines(&self, reference: &RemoteRef, file_path: &str) -> Result<String> {
            if self.broken.contains(&reference.short_name) {
                return Err(ThemeError::HistoryTooShort {
                    reference: reference.short_name.clone(),
                }
                .into());
            }
            Ok(self
                .additions
                .get(&(reference.short_name.clone(), file_path.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    struct Call {
        destination: PathBuf,
        options: Vec<String>,
        conf: String,
    }

    #[derive(Default)]
    struct RecordingTool {
        calls: RefCell<Vec<Call>>,
        statuses: HashMap<String, BuildStatus>,
    }

    impl RecordingTool {
        fn with_status(mut self, theme: &str, status: BuildStatus) -> Self {
            self.statuses.insert(theme.to_string(), status);
            self
        }

        fn built(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.destination.file_name().unwrap().to_string_lossy().to_string())
                .collect()
        }

        fn options_for(&self, theme: &str) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .find(|c| c.destination.ends_with(theme))
                .map(|c| c.options.clone())
                .expect("theme was built")
        }
    }

    impl BuildTool for RecordingTool {
        fn build(&self, source: &Path, destination: &Path, options: &[String]) -> Result<BuildStatus> {
            let conf = std::fs::read_to_string(source.join("conf.py"))?;
            let theme = destination.file_name().unwrap().to_string_lossy().to_string();
            self.calls.borrow_mut().push(Call {
                destination: destination.to_path_buf(),
                options: options.to_vec(),
                conf,
            });
            Ok(self
                .statuses
                .get(&theme)
                .copied()
                .unwrap_or(BuildStatus::Success))
        }
    }

    struct Project {
        root: TempDir,
        settings: Settings,
    }

    fn project() -> Project {
        let root = tempfile::tempdir().expect("can create temp dir");
        let doc = root.path().join("doc");
        std::fs::create_dir_all(&doc).expect("can create doc dir");
        std::fs::write(doc.join("conf.py"), BASE_CONF).expect("can write conf");
        std::fs::write(doc.join("index.rst"), "Docs\n====\n").expect("can write index");
        std::fs::write(root.path().join("README.rst"), "readme").expect("can write readme");
        std::fs::write(root.path().join("CONTRIBUTING.rst"), "contributing")
            .expect("can write contributing");

        let mut settings = Settings::default();
        settings.paths.root = root.path().to_path_buf();
        settings.repository.remote_name = "upstream".to_string();
        Project { root, settings }
    }

    fn registry(names: &[&str]) -> ThemeRegistry {
        let refs = names
            .iter()
            .map(|name| RemoteRef::from_short_name(format!("upstream/{name}-theme")))
            .collect();
        ThemeRegistry::from_refs(refs, &ThemeNaming::new("upstream", "-theme"))
    }

    #[test]
    fn builds_only_requested_themes() {
        let project = project();
        let registry = registry(&["classic", "alabaster"]);
        let diffs = FakeDiffs::default();
        let tool = RecordingTool::default();

        let report = Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .build_themes(&["classic"])
            .expect("can build");

        assert_eq!(tool.built(), vec!["classic".to_string()]);
        assert_eq!(report.succeeded().count(), 1);
        assert!(!report.has_failures());
    }

    #[test]
    fn invalid_request_fails_before_staging() {
        let project = project();
        let registry = registry(&["classic"]);
        let diffs = FakeDiffs::default();
        let tool = RecordingTool::default();

        let err = Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .build_themes(&["bogus"])
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ThemeError>(),
            Some(ThemeError::InvalidTheme { .. })
        ));
        assert!(tool.built().is_empty());
        assert!(!project.settings.staged_doc_dir().exists());
    }

    #[test]
    fn cache_incompatible_themes_skip_shared_cache() {
        let project = project();
        let registry = registry(&["classic", "guzzle"]);
        let diffs = FakeDiffs::default();
        let tool = RecordingTool::default();

        Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .write_all(true)
            .build_themes(&["all"])
            .expect("can build");

        let cache = project
            .settings
            .shared_cache_dir()
            .to_string_lossy()
            .to_string();
        assert_eq!(
            tool.options_for("classic"),
            vec!["-a".to_string(), "-d".to_string(), cache]
        );
        assert_eq!(tool.options_for("guzzle"), vec!["-a".to_string()]);
    }

    #[test]
    fn failed_theme_does_not_stop_the_rest() {
        let project = project();
        let registry = registry(&["classic", "alabaster"]);
        let diffs = FakeDiffs::default();
        let tool = RecordingTool::default().with_status("classic", BuildStatus::Failed(1));

        let report = Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .build_themes(&["all"])
            .expect("failures are reported, not returned");

        assert_eq!(
            tool.built(),
            vec!["classic".to_string(), "alabaster".to_string()]
        );
        let failed: Vec<&ThemeOutcome> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].theme, "classic");
        assert_eq!(failed[0].state, JobState::Failed);
        assert_eq!(report.succeeded().next().map(|o| o.theme.as_str()), Some("alabaster"));
    }

    #[test]
    fn interruption_aborts_remaining_themes() {
        let project = project();
        let registry = registry(&["classic", "alabaster", "press"]);
        let diffs = FakeDiffs::default();
        let tool = RecordingTool::default().with_status("alabaster", BuildStatus::Interrupted);

        let report = Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .build_themes(&["all"])
            .expect("interruptions are reported");

        assert_eq!(
            tool.built(),
            vec!["classic".to_string(), "alabaster".to_string()]
        );
        let states: Vec<(&str, JobState)> = report
            .outcomes
            .iter()
            .map(|o| (o.theme.as_str(), o.state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("classic", JobState::Succeeded),
                ("alabaster", JobState::Aborted)
            ]
        );
        let aborted = report.aborted().expect("run was aborted");
        assert_eq!(
            aborted
                .error
                .as_ref()
                .and_then(|e| e.downcast_ref::<ThemeError>()),
            Some(&ThemeError::Interrupted {
                theme: "alabaster".to_string()
            })
        );
        assert!(!report.has_failures());
    }

    #[test]
    fn short_history_fails_only_that_theme() {
        let project = project();
        let registry = registry(&["classic", "alabaster"]);
        let diffs = FakeDiffs {
            broken: vec!["upstream/classic-theme".to_string()],
            ..FakeDiffs::default()
        };
        let tool = RecordingTool::default();

        let report = Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .build_themes(&["all"])
            .expect("can build");

        assert_eq!(tool.built(), vec!["alabaster".to_string()]);
        let failed: Vec<&ThemeOutcome> = report.failed().collect();
        assert_eq!(failed[0].theme, "classic");
        assert!(matches!(
            failed[0]
                .error
                .as_ref()
                .and_then(|e| e.downcast_ref::<ThemeError>()),
            Some(ThemeError::HistoryTooShort { .. })
        ));
    }

    #[test]
    fn each_theme_gets_only_its_own_additions() {
        let project = project();
        let registry = registry(&["classic", "alabaster"]);
        let diffs = FakeDiffs::default()
            .add("classic-theme", "doc/conf.py", "html_theme = 'classic'\n")
            .add("alabaster-theme", "doc/conf.py", "html_theme = 'alabaster'\n");
        let tool = RecordingTool::default();

        Orchestrator::new(&project.settings, &registry, &diffs, &tool)
            .build_themes(&["all"])
            .expect("can build");

        let calls = tool.calls.borrow();
        assert_eq!(calls[0].conf, "project = 'docs'\nhtml_theme = 'classic'\n");
        assert_eq!(calls[1].conf, "project = 'docs'\nhtml_theme = 'alabaster'\n");
        assert_eq!(
            calls[1].destination,
            project.root.path().join("dev_utils/_build/alabaster")
        );
        assert!(project.root.path().join("dev_utils/tmp/README.rst").is_file());
        assert!(project.root.path().join("dev_utils/tmp/CONTRIBUTING.rst").is_file());
    }
}
