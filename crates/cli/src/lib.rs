pub mod cat;
pub mod check;
pub mod ls;
pub mod source;
pub mod stat;

use assetkit_core::AssetkitConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "assetkit",
    version,
    about = "Inspect read-only asset sources: directories and zip archives",
    long_about = "Assetkit opens application asset sources (plain directories or zip archives such as \
                  APKs), optionally layers an override source on top, and lets you list, read and \
                  inspect the assets they serve."
)]
pub struct Cli {
    /// Config file to use instead of ~/.assetkit/config.json
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the direct children of a directory inside a source
    #[command(
        long_about = "Lists files and subdirectories directly under PREFIX. Plain directory sources \
                            do not support listing and report nothing."
    )]
    Ls {
        /// Directory or zip archive to read from
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Directory inside the source; defaults to the root
        #[arg(value_name = "PREFIX", default_value = "")]
        prefix: String,
        /// Source whose entries shadow those of SOURCE
        #[arg(long = "override", value_name = "SOURCE")]
        override_source: Option<PathBuf>,
    },
    /// Write an asset to stdout
    Cat {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        /// Asset path relative to the source root
        #[arg(value_name = "PATH")]
        path: String,
        #[arg(long = "override", value_name = "SOURCE")]
        override_source: Option<PathBuf>,
    },
    /// Show what a source knows about one asset
    Stat {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
        #[arg(value_name = "PATH")]
        path: String,
        #[arg(long = "override", value_name = "SOURCE")]
        override_source: Option<PathBuf>,
    },
    /// Report whether a source changed since it was opened
    Check {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
    },
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = assetkit_core::logging::init_logging("cli", cli.verbose);

    let config = match &cli.config {
        Some(path) => AssetkitConfig::load(path)?,
        None => AssetkitConfig::load_default()?,
    };
    config.install();
    let flags = config.flags();

    match cli.command {
        Commands::Ls {
            source,
            prefix,
            override_source,
        } => {
            let provider = source::open_layered(&source, override_source.as_deref(), flags)?;
            ls::run(provider.as_ref(), &prefix)
        }
        Commands::Cat {
            source,
            path,
            override_source,
        } => {
            let provider = source::open_layered(&source, override_source.as_deref(), flags)?;
            cat::run(provider.as_ref(), &path)
        }
        Commands::Stat {
            source,
            path,
            override_source,
        } => {
            let provider = source::open_layered(&source, override_source.as_deref(), flags)?;
            stat::run(provider.as_ref(), &path)
        }
        Commands::Check { source } => {
            let provider = source::open(&source, flags)?;
            check::run(provider.as_ref())
        }
    }
}
