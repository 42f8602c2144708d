//! Worker link example
//!
//! Spawns this binary again as a worker process. The worker logs through a
//! cluster channel over its stdio, and the parent prints those records on
//! its console next to its own.
//!
//! Run with: cargo run --example worker_link

use rust_channel_logger::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

const WORKER_FLAG: &str = "--worker";

async fn run_worker() -> Result<()> {
    // stdout belongs to the link here; nothing else may print to it
    let link = Arc::new(WorkerLink::current_process());
    let logger = Logger::new(ChannelOptions::new().with_context_value("appname", "worker"))?;
    logger.add_channel(ClusterChannel::new(link, ChannelOptions::new())?)?;

    for job in 1..=3 {
        logger.info(format!("finished job {}", job)).await?;
    }
    logger.warn("worker shutting down").await?;
    logger.end(None).await
}

async fn run_parent() -> Result<()> {
    println!("=== Rust Channel Logger - Worker Link Example ===\n");

    let logger = Logger::new(ChannelOptions::new().with_context_value("appname", "parent"))?;
    logger.add_channel(ConsoleChannel::new(ConsoleOptions::from_env())?)?;

    let exe = std::env::current_exe()
        .map_err(|e| LoggerError::io_operation("locating executable", "current_exe failed", e))?;
    let link = WorkerLink::spawn(Command::new(exe).arg(WORKER_FLAG))?;
    logger.add_channel(ClusterChannel::new(Arc::new(link), ChannelOptions::new())?)?;

    logger.info("worker started").await?;

    // Worker records arrive asynchronously over its stdout
    tokio::time::sleep(Duration::from_millis(500)).await;

    logger.info("parent done").await?;
    logger.destroy(None).await;

    println!("\n=== Example completed successfully! ===");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == WORKER_FLAG) {
        run_worker().await
    } else {
        run_parent().await
    }
}
