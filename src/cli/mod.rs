pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use self::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Polls HTTP endpoints and alerts when a query over the response matches", long_about = None)]
pub struct Cli {
    /// Directory holding config.yaml and an optional config.local.yaml
    #[arg(short, long, global = true, default_value = ".")]
    configs: PathBuf,

    /// Force debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run every enabled crawl until interrupted
    Run,

    /// Validate the configuration and compile every enabled crawl's queries
    Check,
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Load and validate the configuration from the `--configs` directory
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load(&self.configs)?;
        config.validate()?;
        Ok(config)
    }
}

/// Process the command
pub async fn process_command(cli: &Cli, config: Config) -> Result<()> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run(config).await,
        Commands::Check => commands::check(&config),
    }
}
