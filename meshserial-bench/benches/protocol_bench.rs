//! Protocol encoding/reassembly benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshserial_protocol::{Classifier, Command, Frame, Reassembler};

/// Builds a wire stream of `count` event frames with `payload_size` bytes each.
fn event_stream(count: usize, payload_size: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    for i in 0..count {
        stream.push((payload_size + 1) as u8);
        stream.push(0xB3);
        stream.extend(std::iter::repeat(i as u8).take(payload_size));
    }
    stream
}

fn bench_command_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_encode");

    for size in [4, 16, 64, 128] {
        let command = Command::ValueSet {
            handle: 7,
            data: vec![0x42; size],
        };

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &command, |b, command| {
            b.iter(|| black_box(command.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_build");

    for size in [0, 16, 64, 253] {
        let payload = vec![0x42u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(Frame::build(0xB3, payload).unwrap()));
        });
    }

    group.finish();
}

fn bench_reassemble_bulk(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble_bulk");

    for size in [4, 32, 128] {
        let stream = event_stream(64, size);

        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &stream, |b, stream| {
            b.iter(|| {
                let mut reassembler = Reassembler::new();
                black_box(reassembler.feed(stream))
            });
        });
    }

    group.finish();
}

fn bench_reassemble_fragmented(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble_fragmented");

    for chunk_size in [1, 7, 61] {
        let stream = event_stream(64, 32);

        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(chunk_size),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut reassembler = Reassembler::new();
                    let mut frames = Vec::new();
                    for chunk in stream.chunks(chunk_size) {
                        frames.extend(reassembler.feed(chunk));
                    }
                    black_box(frames)
                });
            },
        );
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    let classifier = Classifier::default();
    let frames = vec![
        Frame::build(0x84, &[0x74, 0x00]).unwrap(),
        Frame::build(0x82, &[0x01, 0x02]).unwrap(),
        Frame::build(0xB3, &[0x00, 0x00, 0x05]).unwrap(),
        Frame::build(0xB6, &[0x01, 0x00]).unwrap(),
    ];

    group.throughput(Throughput::Elements(frames.len() as u64));
    group.bench_function("mixed", |b| {
        b.iter(|| {
            for frame in &frames {
                black_box(classifier.classify(frame));
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_encode,
    bench_frame_build,
    bench_reassemble_bulk,
    bench_reassemble_fragmented,
    bench_classify,
);

criterion_main!(benches);
