//! Basic logger usage example
//!
//! Demonstrates a logger fanning records out to a colored console channel,
//! per-level methods, the logging macros and structured data.
//!
//! Run with: cargo run --example basic_usage

use rust_channel_logger::prelude::*;
use rust_channel_logger::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Rust Channel Logger - Basic Usage Example ===\n");

    // A logger is a channel whose transport is its children
    let logger = Logger::new(ChannelOptions::new().with_context_value("appname", "basic"))?;

    // Console channel with the default syslog template
    let console = ConsoleChannel::new(ConsoleOptions::from_env())?;
    logger.add_channel(console.clone())?;

    println!("1. Logging at every level:");
    logger.emerg("This is an emergency").await?;
    logger.alert("This is an alert").await?;
    logger.crit("This is critical").await?;
    logger.error("This is an error").await?;
    logger.warn("This is a warning").await?;
    logger.note("This is a notice").await?;
    logger.info("This is informational").await?;
    logger.debug("This is a debug message").await?;

    println!("\n2. Restricting the console to a few levels:");
    console.set_levels(&[Level::Error, Level::Warning])?;
    logger.info("Info message (hidden)").await?;
    logger.error("Error message (visible)").await?;
    warn!(logger, "Disk usage at {}%", 91).await?;

    println!("\n3. Structured data:");
    console.set_levels(&Level::ALL)?;
    logger
        .log_with_context(
            Level::Notice,
            "user signed in",
            Fields::new()
                .with("msgid", "AUTH")
                .with("sd", Fields::new().with("id", "user").with("name", "alice")),
        )
        .await?;
    info!(logger, "{} requests served", 42).await?;

    logger.end(None).await?;

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
