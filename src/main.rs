use anyhow::Result;
use tracing::{error, info};

mod alert;
mod cli;
mod crawler;
mod pipeline;
mod query;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    let config = args.load_config()?;

    utils::init_logging(&config.log, args.verbose())?;

    match cli::process_command(&args, config).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}
