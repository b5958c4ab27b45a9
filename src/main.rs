use std::path::Path;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::analyze::AnalyzeArgs;
use cli::config_cmd::ConfigArgs;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("CODESHAPE_BUILD_DATE"),
    ", ",
    env!("CODESHAPE_BUILD_TARGET"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "codeshape",
    version,
    long_version = LONG_VERSION,
    about = "Extract structure, calls and imports from source files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze files or directories and print their structure
    Analyze(AnalyzeArgs),
    /// List registered file extensions and the analyzers serving them
    Languages,
    /// Manage configuration (.codeshape.json)
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Analyze(args)) => {
            let config = cli::init(Path::new("."));
            cli::analyze::run(args, &config).await
        }
        Some(Commands::Languages) => {
            cli::init(Path::new("."));
            cli::languages::run()
        }
        Some(Commands::Config(args)) => cli::config_cmd::run(args),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
