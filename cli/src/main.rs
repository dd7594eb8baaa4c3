//! doc-inbox: convert documents dropped into a directory to plain text.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use doc_inbox_extract::ExtractorRegistry;
use doc_inbox_watcher::WatchService;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Overrides};

#[derive(Parser, Debug)]
#[command(name = "doc-inbox")]
#[command(about = "Watch a directory and convert new documents to .txt files")]
#[command(version)]
struct Args {
    /// Directory to watch (default: ./inbox)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory to write text files to (default: ./outbox)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Config file (default: <config dir>/doc-inbox/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset, e.g. "debug"
    #[arg(long)]
    log_level: Option<String>,

    /// Print the supported file extensions and exit
    #[arg(long)]
    list_extensions: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?.with_overrides(Overrides {
        input: args.input,
        output: args.output,
        log_level: args.log_level,
    });

    init_tracing(&config.log_level);

    let registry = Arc::new(ExtractorRegistry::with_defaults());
    if args.list_extensions {
        for ext in registry.extensions() {
            println!("{ext}");
        }
        return Ok(());
    }

    let timeout = config.watch.shutdown_timeout();
    let watcher =
        WatchService::start(config.watch, registry).context("Failed to start inbox watcher")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, finishing the current file");
        }
        () = watcher.stopped() => {}
    }

    let report = watcher
        .shutdown(timeout)
        .await
        .context("Inbox watcher stopped with an error")?;
    info!("Stopped: {report}");
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
