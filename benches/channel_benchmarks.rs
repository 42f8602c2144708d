//! Criterion benchmarks for rust_channel_logger

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_channel_logger::core::{ChannelCore, Formatter, Processor, Validator};
use rust_channel_logger::prelude::*;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn sample_record() -> Record {
    Record::message("request served")
        .with("level", Level::Info)
        .with("msgid", "HTTP")
        .with(
            "sd",
            Fields::new().with("id", "req").with("path", "/orders").with("status", 200),
        )
}

// ============================================================================
// Handler Chain Benchmarks
// ============================================================================

fn bench_handlers(c: &mut Criterion) {
    let mut group = c.benchmark_group("handlers");
    group.throughput(Throughput::Elements(1));

    let core = ChannelCore::new(ChannelOptions::new().with_context_value("appname", "bench"))
        .expect("core");
    let validator = Validator::default();
    let processor = Processor::default();
    let formatter = Formatter::default();
    let payload = Payload::from(sample_record());

    group.bench_function("validate", |b| {
        b.iter(|| black_box(validator.execute(&core, black_box(&payload))));
    });

    group.bench_function("process", |b| {
        b.iter(|| black_box(processor.execute(&core, black_box(payload.clone()))));
    });

    let processed = processor.execute(&core, payload.clone());
    group.bench_function("format_default_template", |b| {
        b.iter(|| black_box(formatter.format(&core, black_box(&processed))));
    });

    group.finish();
}

// ============================================================================
// Channel Write Benchmarks
// ============================================================================

fn bench_channel_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_write");
    group.throughput(Throughput::Elements(1));
    let rt = runtime();

    let transport = Arc::new(MemoryTransport::new());
    let channel = StreamChannel::new(transport.clone(), ChannelOptions::new()).expect("channel");
    group.bench_function("stream", |b| {
        b.iter(|| {
            rt.block_on(channel.write(black_box(sample_record()).into()))
                .expect("write");
            transport.clear();
        });
    });

    let filtered = StreamChannel::new(
        transport.clone(),
        ChannelOptions::new().with_level(Level::Emergency),
    )
    .expect("channel");
    group.bench_function("filtered_out", |b| {
        b.iter(|| rt.block_on(filtered.write(black_box(sample_record()).into())));
    });

    group.finish();
}

// ============================================================================
// Logger Fan-out Benchmarks
// ============================================================================

fn bench_logger_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("logger_fan_out");
    group.throughput(Throughput::Elements(1));
    let rt = runtime();

    for children in [1usize, 4, 16] {
        let (logger, transports) = rt.block_on(async {
            let logger = Logger::new(ChannelOptions::new()).expect("logger");
            let mut transports = Vec::new();
            for _ in 0..children {
                let transport = Arc::new(MemoryTransport::new());
                let channel = StreamChannel::new(
                    transport.clone(),
                    ChannelOptions::new().with_template("%level% %msg%\n"),
                )
                .expect("channel");
                logger.add_channel(channel).expect("add");
                transports.push(transport);
            }
            (logger, transports)
        });

        group.bench_function(format!("children_{}", children), |b| {
            b.iter(|| {
                rt.block_on(logger.info(black_box("fan out"))).expect("log");
                for transport in &transports {
                    transport.clear();
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// File Channel Benchmarks
// ============================================================================

fn bench_file_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_channel");
    group.throughput(Throughput::Elements(1));
    let rt = runtime();
    let dir = tempfile::tempdir().expect("temp dir");

    let plain = rt
        .block_on(FileChannel::new(dir.path(), "plain", FileChannelOptions::new()))
        .expect("file channel");
    group.bench_function("write", |b| {
        b.iter(|| rt.block_on(plain.write(black_box(sample_record()).into())).expect("write"));
    });

    let rotating = rt
        .block_on(FileChannel::new(
            dir.path(),
            "rotating",
            FileChannelOptions::new().with_policy(
                RotationPolicy::new()
                    .with_size_limit(64 * 1024u64)
                    .with_compression(true),
            ),
        ))
        .expect("file channel");
    group.bench_function("write_with_rotation", |b| {
        b.iter(|| {
            rt.block_on(rotating.write(black_box(sample_record()).into()))
                .expect("write")
        });
    });

    group.finish();
    rt.block_on(async {
        plain.end(None).await.expect("end");
        rotating.end(None).await.expect("end");
    });
}

criterion_group!(
    benches,
    bench_handlers,
    bench_channel_write,
    bench_logger_fan_out,
    bench_file_channel,
);

criterion_main!(benches);
