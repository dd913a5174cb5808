use anyhow::{anyhow, Context, Result};
use build::{generate_requirements, Orchestrator, SphinxBuild};
use cli::{BuildArgs, Cli, Commands};
use log::LevelFilter;
use settings::Settings;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use themes::{ThemeNaming, ThemeRegistry};
use vcs::Mirror;

mod build;
mod cli;
mod error;
mod init;
mod settings;
mod themes;
mod vcs;

fn main() -> ExitCode {
    if let Err(e) = try_main() {
        eprintln!("{}: {e:#}", console::style("Error").red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn try_main() -> Result<()> {
    use clap::Parser;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Init = cli.command {
        return init::run(&cli.config);
    }

    let settings = Settings::load(&cli.config)?;
    let mirror = Mirror::ensure_local_mirror(&settings.work_dir(), &settings.repository)
        .with_context(|| "Failed to prepare the local mirror")?;

    if cli.fetch || matches!(cli.command, Commands::Fetch) {
        mirror.fetch()?;
    }

    let naming = ThemeNaming::new(
        &settings.repository.remote_name,
        &settings.repository.theme_suffix,
    );
    let registry = ThemeRegistry::from_refs(
        mirror.list_theme_refs(&settings.repository.theme_suffix)?,
        &naming,
    );

    match &cli.command {
        Commands::Init => Ok(()),
        Commands::Fetch => {
            println!("Found {} theme branch(es)", registry.themes().len());
            Ok(())
        }
        Commands::List { json } => {
            if *json {
                let themes = serde_json::to_string_pretty(registry.themes())
                    .with_context(|| "Failed to convert themes to JSON")?;
                println!("{themes}");
            } else {
                println!("The available themes are:");
                for name in registry.all_theme_names() {
                    println!("  {name}");
                }
            }
            Ok(())
        }
        Commands::Requirements => write_requirements(&settings, &registry, &mirror),
        Commands::Build(args) => {
            if !settings.requirements_out().is_file() {
                return write_requirements(&settings, &registry, &mirror);
            }
            build_themes(&settings, &registry, &mirror, args)
        }
    }
}

fn write_requirements(
    settings: &Settings,
    registry: &ThemeRegistry,
    mirror: &Mirror,
) -> Result<()> {
    println!("Building the theme requirements file...");
    let path = generate_requirements(settings, registry, mirror)?;
    println!(
        "Make sure that all requirements are installed by running:\n  {}",
        console::style(format!("pip install -r {}", path.display())).bold()
    );
    Ok(())
}

fn build_themes(
    settings: &Settings,
    registry: &ThemeRegistry,
    mirror: &Mirror,
    args: &BuildArgs,
) -> Result<()> {
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .with_context(|| "Failed to install the Ctrl-C handler")?;
    }
    let tool = SphinxBuild::new(settings.build.command.clone(), interrupted);

    let report = Orchestrator::new(settings, registry, mirror, &tool)
        .write_all(args.write_all)
        .build_themes(&args.themes)?;

    println!();
    for outcome in report.succeeded() {
        println!(
            "  {} {}",
            console::style("built").green(),
            settings.theme_build_dir(&outcome.theme).display()
        );
    }
    for outcome in report.failed() {
        match &outcome.error {
            Some(e) => println!("  {} {}: {e:#}", console::style("failed").red(), outcome.theme),
            None => println!("  {} {}", console::style("failed").red(), outcome.theme),
        }
    }

    if let Some(aborted) = report.aborted() {
        println!("  {} {}", console::style("aborted").yellow(), aborted.theme);
        return Err(anyhow!(
            "Interrupted while building {}, skipped the remaining themes",
            aborted.theme
        ));
    }
    if report.has_failures() {
        let failed: Vec<&str> = report.failed().map(|o| o.theme.as_str()).collect();
        return Err(anyhow!("Failed to build [{}]", failed.join("], [")));
    }
    Ok(())
}
