//! Integration tests for the channel logger
//!
//! These tests verify:
//! - Level filtering and self-publish rejection per channel
//! - Syslog line rendering through a logger
//! - File rotation by size, with and without compression
//! - Failure containment between sibling channels
//! - Worker to parent forwarding over a worker link
//! - Graceful and forced shutdown

use flate2::read::GzDecoder;
use rust_channel_logger::prelude::*;
use rust_channel_logger::core::{ChannelCore, DEFAULT_TEMPLATE};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route engine diagnostics to the test output; filter with `RUST_LOG`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn memory_channel(options: ChannelOptions) -> (Arc<StreamChannel>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let channel = StreamChannel::new(transport.clone(), options).expect("channel");
    (channel, transport)
}

fn files_with(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect();
    found.sort();
    found
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_single_level_channel_only_forwards_that_level() {
    init_tracing();
    for level in Level::ALL {
        let (channel, transport) =
            memory_channel(ChannelOptions::new().with_level(level).with_template("%level%\n"));
        for other in Level::ALL {
            let record = Record::message("x").with("level", other);
            channel.write(record.into()).await.expect("write");
        }
        assert_eq!(transport.lines(), vec![level.name().to_string()]);
    }
}

#[tokio::test]
async fn test_own_publisher_id_is_rejected() {
    init_tracing();
    let (channel, transport) = memory_channel(ChannelOptions::new().with_template("%msg%\n"));

    let own = Record::message("loop")
        .with("level", Level::Emergency)
        .with("pub", channel.id().to_string());
    let foreign = Record::message("ok").with("pub", ChannelId::new().to_string());

    channel.write(own.into()).await.expect("write");
    channel.write(foreign.into()).await.expect("write");
    assert_eq!(transport.lines(), vec!["ok"]);
}

#[tokio::test]
async fn test_default_template_renders_syslog_line() {
    init_tracing();
    let logger = Logger::new(ChannelOptions::new().with_context_value("appname", "shop"))
        .expect("logger");
    let (channel, transport) = memory_channel(ChannelOptions::new());
    logger.add_channel(channel).expect("add");

    logger
        .log_with_context(
            Level::Warning,
            "stock low",
            Fields::new()
                .with("msgid", "ST01")
                .with("sd", Fields::new().with("id", "item").with("sku", "A-1")),
        )
        .await
        .expect("log");

    let line = transport.contents_string();
    let parts: Vec<&str> = line.splitn(9, ' ').collect();
    assert_eq!(parts[0], "<12>");
    assert_eq!(parts[1], "1");
    assert!(parts[2].ends_with('Z'), "timestamp {}", parts[2]);
    assert_eq!(parts[4], "shop");
    assert_eq!(parts[5], std::process::id().to_string());
    assert_eq!(parts[6], "ST01");
    assert_eq!(parts[7], "[item");
    assert!(line.ends_with("[item sku=A-1] stock low \n"));
    assert_eq!(Formatter::default().template(), DEFAULT_TEMPLATE);
}

#[tokio::test]
async fn test_size_rotation_leaves_only_second_message() {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let policy = RotationPolicy::new()
        .with_size_limit(8u64)
        .with_date_template("yyyy");
    let channel = FileChannel::new(
        dir.path(),
        "svc",
        FileChannelOptions::new()
            .with_channel(ChannelOptions::new().with_template("%msg%\n"))
            .with_policy(policy),
    )
    .await
    .expect("file channel");

    channel.write("message".into()).await.expect("first");
    channel.write("second!".into()).await.expect("second");
    let path = channel.current_path().await.expect("open file");
    channel.end(None).await.expect("end");

    assert_eq!(std::fs::read_to_string(path).expect("read"), "second!\n");
}

#[tokio::test]
async fn test_oversized_message_fails_without_writing() {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let channel = FileChannel::new(
        dir.path(),
        "svc",
        FileChannelOptions::new()
            .with_channel(ChannelOptions::new().with_template("%msg%\n"))
            .with_policy(RotationPolicy::new().with_size_limit_str("1kb").expect("size")),
    )
    .await
    .expect("file channel");

    let big = "x".repeat(2048);
    let err = channel.write(big.as_str().into()).await.unwrap_err();
    assert!(matches!(err, LoggerError::MessageTooLarge { limit: 1024, .. }));

    let path = channel.current_path().await.expect("open file");
    channel.end(None).await.expect("end");
    assert!(std::fs::read(path).expect("read").is_empty());
}

#[tokio::test]
async fn test_compressed_archive_matches_written_bytes() {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let channel = FileChannel::new(
        dir.path(),
        "svc",
        FileChannelOptions::new()
            .with_channel(ChannelOptions::new().with_template("%msg%\n"))
            .with_policy(
                RotationPolicy::new()
                    .with_compression(true)
                    .with_size_limit(64u64),
            ),
    )
    .await
    .expect("file channel");

    let mut expected = String::new();
    let mut total = 0;
    let mut i = 0;
    loop {
        let line = format!("entry {:03}\n", i);
        if total + line.len() > 64 {
            break;
        }
        total += line.len();
        expected.push_str(&line);
        channel.write(line.trim_end().into()).await.expect("write");
        i += 1;
    }
    let first = channel.current_path().await.expect("open file");
    channel.write("overflow".into()).await.expect("write");
    channel.end(None).await.expect("end");

    assert!(!first.exists());
    let archives = files_with(dir.path(), "gz");
    assert_eq!(archives.len(), 1);
    let mut decoded = String::new();
    GzDecoder::new(std::fs::File::open(&archives[0]).expect("open"))
        .read_to_string(&mut decoded)
        .expect("decode");
    assert_eq!(decoded, expected);
}

#[tokio::test]
async fn test_failing_child_is_reported_and_removed() {
    init_tracing();
    let logger = Logger::new(ChannelOptions::new()).expect("logger");
    let (a, broken) = memory_channel(ChannelOptions::new().with_template("%msg%\n"));
    let (b, healthy) =
        memory_channel(ChannelOptions::new().with_template("%level%|%pub%|%msg%\n"));
    logger.add_channel(a.clone()).expect("add a");
    logger.add_channel(b).expect("add b");

    broken.raise("transport lost");

    eventually(|| !healthy.lines().is_empty()).await;
    let line = healthy.lines().remove(0);
    assert_eq!(
        line,
        format!(
            "crit|{}|IO error while writing to memory transport: transport lost",
            a.id()
        )
    );

    eventually(|| !logger.has_channel(a.id())).await;
    assert_eq!(a.state(), ChannelState::Closed);

    logger.info("still flowing").await.expect("log");
    let expected = format!("info|{}|still flowing", logger.id());
    assert_eq!(healthy.lines().last(), Some(&expected));
}

#[tokio::test]
async fn test_errors_surface_on_logger_once_ending() {
    init_tracing();
    let logger = Logger::new(ChannelOptions::new()).expect("logger");
    let (a, broken) = memory_channel(ChannelOptions::new());
    logger.add_channel(a).expect("add");
    let mut events = logger.subscribe();

    broken.fail_with("closed pipe");
    logger.end(Some("last".into())).await.expect("end");

    let mut saw_error = false;
    while let Some(event) = events.recv().await {
        if let ChannelEvent::Error(error) = event {
            assert!(error.to_string().contains("closed pipe"));
            saw_error = true;
        }
    }
    assert!(saw_error);
    assert_eq!(logger.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_worker_records_reach_parent_logger_children() {
    init_tracing();
    let (parent_link, worker_link) = WorkerLink::pair();

    let parent_logger = Logger::new(ChannelOptions::new()).expect("logger");
    let cluster = ClusterChannel::new(Arc::new(parent_link), ChannelOptions::new()).expect("cluster");
    let (sink, output) = memory_channel(ChannelOptions::new().with_template("%level% %msg%\n"));
    parent_logger.add_channel(cluster).expect("add cluster");
    parent_logger.add_channel(sink).expect("add sink");

    let worker = ClusterChannel::new(
        Arc::new(worker_link),
        ChannelOptions::new().with_template("worker says %msg%"),
    )
    .expect("worker");
    let record = Record::message("hi").with("level", Level::Notice);
    worker.write(record.into()).await.expect("send");

    eventually(|| !output.lines().is_empty()).await;
    assert_eq!(output.lines(), vec!["worker says hi"]);

    parent_logger.end(None).await.expect("end");
}

#[tokio::test]
async fn test_console_channel_colors_by_level() {
    init_tracing();
    let transport = Arc::new(MemoryTransport::new());
    let console = ConsoleChannel::with_transport(
        transport.clone(),
        ConsoleOptions::new().with_channel(ChannelOptions::new().with_template("%msg%")),
    )
    .expect("console");

    console
        .write(Record::message("fire").with("level", Level::Critical).into())
        .await
        .expect("write");
    assert_eq!(transport.contents_string(), "\u{1b}[31;1mfire\u{1b}[0m");
}

#[tokio::test]
async fn test_destroy_cascades_and_reports_error() {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let logger = Logger::new(ChannelOptions::new()).expect("logger");
    let file = FileChannel::new(dir.path(), "svc", FileChannelOptions::new())
        .await
        .expect("file");
    logger.add_channel(file.clone()).expect("add");
    let mut events = logger.subscribe();

    logger.destroy(Some(LoggerError::other("shutdown now"))).await;

    assert_eq!(file.state(), ChannelState::Closed);
    match events.recv().await {
        Some(ChannelEvent::Error(error)) => assert!(error.to_string().contains("shutdown now")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert!(matches!(events.recv().await, Some(ChannelEvent::Close)));
}

#[tokio::test]
async fn test_custom_processor_step() {
    init_tracing();
    let mut processor = Processor::new();
    processor
        .set("tenant", |_core: &ChannelCore, mut record: Record| {
            record.fill("tenant", || FieldValue::from("acme"));
            record
        })
        .expect("step");
    let (channel, transport) = memory_channel(
        ChannelOptions::new()
            .with_processor(processor)
            .with_template("%tenant% %msg%\n"),
    );

    channel.write("hello".into()).await.expect("write");
    assert_eq!(transport.lines(), vec!["acme hello"]);
}

#[tokio::test]
async fn test_transport_errors_reach_channel_subscribers() {
    init_tracing();
    let (channel, transport) = memory_channel(ChannelOptions::new());
    let mut events = channel.subscribe();

    transport.raise("cable cut");
    match events.recv().await {
        Some(ChannelEvent::Error(error)) => assert!(error.to_string().contains("cable cut")),
        other => panic!("expected error event, got {:?}", other),
    }
    assert!(matches!(events.recv().await, Some(ChannelEvent::Close)));
    assert!(transport.is_destroyed());
}
