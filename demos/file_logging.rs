//! File logging example
//!
//! Demonstrates logging to the console and to a rotating, compressing
//! file channel at the same time.
//!
//! Run with: cargo run --example file_logging

use rust_channel_logger::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Rust Channel Logger - File Logging Example ===\n");

    let logger = Logger::new(ChannelOptions::new().with_context_value("appname", "files"))?;
    logger.add_channel(ConsoleChannel::new(ConsoleOptions::from_env())?)?;

    // Rotate every 4kb or every minute, gzipping the previous file
    let policy = RotationPolicy::new()
        .with_size_limit_str("4kb")?
        .with_time_limit(TimeBoundary::Minute)
        .with_compression(true);
    let file = FileChannel::new(
        "logs",
        "files",
        FileChannelOptions::new().with_policy(policy),
    )
    .await?;
    logger.add_channel(file.clone())?;

    println!("1. Logging to both console and file:");
    logger.info("Application started").await?;
    logger.debug("Loading configuration...").await?;
    logger.warn("Using default settings for some options").await?;
    logger.error("Failed to load optional plugin").await?;

    println!("\n2. Writing enough to rotate:");
    for i in 1..=50 {
        logger
            .log_with_context(
                Level::Info,
                format!("Processing item {}/50", i),
                Fields::new().with("sd", Fields::new().with("id", "job").with("item", i)),
            )
            .await?;
    }

    let current = file.current_path().await;
    logger.end(None).await?;

    println!("\n=== Example completed successfully! ===");
    if let Some(path) = current {
        println!("Current log file: {}", path.display());
    }
    println!("Rotated archives are in 'logs/*.gz'");

    Ok(())
}
