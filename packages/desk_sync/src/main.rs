use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::prelude::*;

use desk_sync::config::{DataDir, FileConfig, SyncConfig, load_config};
use desk_sync::connection::ConnectionManager;
use desk_sync::engine::SyncEngine;
use desk_sync::rest::RestBackend;

#[derive(Parser)]
#[command(name = "desk-sync")]
#[command(about = "Synchronization daemon for the live-support operator console")]
struct Cli {
    /// Custom data directory (defaults to ~/.desk-sync)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the configured backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug {
        "desk_sync=debug,info"
    } else {
        "desk_sync=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let data_dir = DataDir::new(cli.data_dir)?;
    let mut file_config: FileConfig = load_config(&data_dir.path)
        .extract()
        .context("invalid configuration")?;
    if let Some(base_url) = cli.base_url {
        file_config.server.base_url = base_url;
    }
    let config = SyncConfig::from_file(&file_config);
    info!(base_url = %config.base_url, operator = %config.operator_identity, "starting");

    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(config.event_capacity);

    let connection = ConnectionManager::spawn(config.clone(), events_tx.clone(), cancel.clone());
    let backend = Arc::new(RestBackend::new(config.clone()).context("building http client")?);

    let (engine, handle) = SyncEngine::new(
        connection.clone(),
        backend,
        config.operator_identity.clone(),
        events_tx,
        cancel.clone(),
    );
    let engine_task = tokio::spawn(engine.run(events_rx));

    // Status line: log the conversation list whenever it changes.
    let mut chat_list_rx = handle.chat_list();
    let status_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = status_cancel.cancelled() => break,
                changed = chat_list_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let list = chat_list_rx.borrow_and_update().clone();
                    let unread = list.iter().filter(|e| e.unread).count();
                    info!(conversations = list.len(), unread, "chat list updated");
                }
            }
        }
    });

    tokio::signal::ctrl_c().await.context("listening for ctrl-c")?;
    info!("shutting down");
    handle.shutdown().await;
    let _ = engine_task.await;

    Ok(())
}
