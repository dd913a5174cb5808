use crate::settings::DEFAULT_CONFIG_FILE;
use crate::themes::ALL_THEMES;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Names of the themes which should be built
    #[clap(short, long, num_args = 1.., default_value = ALL_THEMES)]
    pub themes: Vec<String>,

    /// Write all files (default: only write new and changed files)
    #[clap(short = 'a', long)]
    pub write_all: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Shows all available themes
    List {
        /// Print the themes as JSON
        #[clap(long)]
        json: bool,
    },
    /// Fetches the remote theme branches
    Fetch,
    /// Regenerates the requirements file needed to build every theme
    Requirements,
    /// Builds the documentation with every selected theme
    Build(BuildArgs),
    /// Writes a theme-builder.toml with the default settings
    Init,
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// Configuration file
    #[clap(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Fetch the remote refs before running the command
    #[clap(long, global = true)]
    pub fetch: bool,

    /// More output per occurrence
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Commands,
}
