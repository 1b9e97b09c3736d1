/// Benchmarks for the STOMP frame codec.
///
/// Decoding runs for every inbound transport message, so the focus is on `MESSAGE` frames of
/// varying body size and on transport messages batching several frames.
use std::fmt::Write as _;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use stomp_ws_client::stomp::frame::{Command, Frame, Headers, decode, encode};

fn message_frame(body_len: usize) -> String {
    let body = "x".repeat(body_len);
    format!(
        "MESSAGE\ndestination:/topic/prices\nsubscription:sub-1\nmessage-id:42\ncontent-type:application/json\n\n{body}\0"
    )
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame/decode");

    for body_len in [0, 128, 4_096, 65_536] {
        let raw = message_frame(body_len);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("MESSAGE", body_len), &raw, |b, raw| {
            b.iter(|| decode(std::hint::black_box(raw)));
        });
    }

    let mut batch = String::new();
    for i in 0..32 {
        let _ = write!(
            batch,
            "MESSAGE\ndestination:/topic/prices\nsubscription:sub-1\nmessage-id:{i}\n\n{{\"price\":{i}}}\0\n"
        );
    }
    group.throughput(Throughput::Bytes(batch.len() as u64));
    group.bench_function("batch_of_32", |b| {
        b.iter(|| decode(std::hint::black_box(&batch)));
    });

    let heartbeat = "\n";
    group.bench_function("heartbeat", |b| {
        b.iter(|| decode(std::hint::black_box(heartbeat)));
    });

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame/encode");

    let body = r#"{"side":"buy","price":"0.55","size":"100"}"#;
    let headers = Headers::from([
        ("destination", "/app/orders"),
        ("receipt", "r-1"),
        ("content-type", "application/json"),
        ("content-length", "42"),
    ]);
    group.bench_function("SEND", |b| {
        b.iter(|| {
            encode(
                Command::Send,
                std::hint::black_box(&headers),
                Some(std::hint::black_box(body)),
            )
        });
    });

    let subscribe = Frame::new(Command::Subscribe)
        .header("id", "sub-1")
        .header("destination", "/topic/prices")
        .header("ack", "auto");
    group.bench_function("SUBSCRIBE", |b| {
        b.iter(|| std::hint::black_box(&subscribe).encode());
    });

    group.finish();
}

criterion_group!(frame_benches, bench_decode, bench_encode);
criterion_main!(frame_benches);
