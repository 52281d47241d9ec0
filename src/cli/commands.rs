use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::alert::build_senders;
use crate::cli::config::Config;
use crate::crawler::ReqwestCrawler;
use crate::pipeline::Processor;

fn build_processor(config: &Config) -> Result<Processor> {
    let crawler = ReqwestCrawler::new().context("building http client")?;
    let senders = build_senders(&config.alerts)?;
    let processor = Processor::new(&config.crawls, Arc::new(crawler), senders)?;
    Ok(processor)
}

/// Run every enabled crawl until a termination signal arrives
pub async fn run(config: Config) -> Result<()> {
    let mut processor = build_processor(&config)?;

    info!("Starting crawlert v{}", env!("CARGO_PKG_VERSION"));
    processor.run();

    let signal = wait_for_signal().await?;
    info!(signal, "Received signal, shutting down");

    processor.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Build everything `run` would without starting any crawl
pub fn check(config: &Config) -> Result<()> {
    let processor = build_processor(config)?;

    println!("Configuration is valid");
    println!("Alerts: {:?}", config.alerts.kind);
    println!("Enabled crawls:");
    for crawl in config.enabled_crawls() {
        println!(
            "  - {} ({} {} every {:?})",
            crawl.name,
            crawl.target.http.method,
            crawl.target.http.url,
            crawl.interval
        );
    }

    let disabled = config.crawls.len() - processor.groups().count();
    if disabled > 0 {
        println!("Disabled crawls: {}", disabled);
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut quit = signal(SignalKind::quit()).context("installing SIGQUIT handler")?;

    let name = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for SIGINT")?;
            "SIGINT"
        }
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };

    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await.context("listening for ctrl-c")?;
    Ok("ctrl-c")
}
