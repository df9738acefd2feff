//! Encoder and decoder throughput.
//!
//! Covers:
//! - Compression across levels and data shapes
//! - Strategies at the default level
//! - Decompression, one-shot and through small buffers

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_core::traits::{Compressor, Decompressor};
use oxiflate_core::{Status, StreamBuffers};
use oxiflate_deflate::{Decoder, Encoder, EncoderConfig, Strategy, Wrapper, deflate, inflate};
use std::hint::black_box;

mod test_data {
    /// Pseudo-random bytes from a fixed-seed LCG.
    pub fn random(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }

    /// Repeating English text.
    pub fn text_like(size: usize) -> Vec<u8> {
        b"The quick brown fox jumps over the lazy dog. "
            .iter()
            .copied()
            .cycle()
            .take(size)
            .collect()
    }

    /// Long runs of a few byte values.
    pub fn runs(size: usize) -> Vec<u8> {
        (0..size).map(|i| b"abc"[(i / 97) % 3]).collect()
    }
}

const SIZE: usize = 256 * 1024;

fn bench_levels(c: &mut Criterion) {
    for (shape, data) in [
        ("text", test_data::text_like(SIZE)),
        ("random", test_data::random(SIZE)),
        ("runs", test_data::runs(SIZE)),
    ] {
        let mut group = c.benchmark_group(format!("deflate_{}", shape));
        group.throughput(Throughput::Bytes(data.len() as u64));
        for level in [1u8, 6, 9] {
            group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
                b.iter(|| black_box(deflate(black_box(data), level)));
            });
        }
        group.finish();
    }
}

fn bench_strategies(c: &mut Criterion) {
    let data = test_data::text_like(SIZE);
    let mut group = c.benchmark_group("deflate_strategy");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for strategy in [
        Strategy::Default,
        Strategy::Filtered,
        Strategy::HuffmanOnly,
        Strategy::Rle,
        Strategy::Fixed,
    ] {
        let config = EncoderConfig::new().wrapper(Wrapper::Raw).strategy(strategy);
        group.bench_function(format!("{:?}", strategy), |b| {
            b.iter(|| {
                let mut encoder = Encoder::new(config.clone()).unwrap_or_else(|e| panic!("{e}"));
                black_box(encoder.compress_all(black_box(&data)))
            });
        });
    }
    group.finish();
}

fn bench_inflate(c: &mut Criterion) {
    let data = test_data::text_like(SIZE);
    let compressed = deflate(&data, 6).unwrap_or_else(|e| panic!("{e}"));
    let mut group = c.benchmark_group("inflate_text");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("one_shot", |b| {
        b.iter(|| black_box(inflate(black_box(&compressed))));
    });

    group.bench_function("4k_buffers", |b| {
        let mut out = vec![0u8; 4096];
        b.iter(|| {
            let mut decoder = Decoder::raw();
            let mut pos = 0;
            let mut total = 0;
            loop {
                let end = (pos + 4096).min(compressed.len());
                let mut buffers = StreamBuffers::new(&compressed[pos..end], &mut out);
                let status = decoder.process(&mut buffers);
                pos += buffers.input_consumed();
                total += buffers.output_produced();
                if !matches!(status, Ok(Status::Ok)) {
                    break;
                }
            }
            black_box(total)
        });
    });

    group.bench_function("decompress_all", |b| {
        b.iter(|| black_box(Decoder::raw().decompress_all(black_box(&compressed))));
    });
    group.finish();
}

criterion_group!(benches, bench_levels, bench_strategies, bench_inflate);
criterion_main!(benches);
