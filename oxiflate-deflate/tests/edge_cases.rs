//! Edge-case inputs pushed through the streaming encoder and decoder with
//! awkward buffer sizes.

use oxiflate_core::traits::{Compressor, Decompressor};
use oxiflate_core::{FlushMode, Status};
use oxiflate_deflate::{Decoder, Encoder, deflate, inflate};

/// Compress with input fed in `step`-byte pieces and a `room`-byte output.
fn encode_in_pieces(data: &[u8], level: u8, step: usize, room: usize) -> Vec<u8> {
    let mut encoder = Encoder::raw(level).unwrap();
    let mut compressed = Vec::new();
    let mut out = vec![0u8; room];
    let mut pos = 0;
    loop {
        let end = (pos + step).min(data.len());
        let flush = if end == data.len() {
            FlushMode::Finish
        } else {
            FlushMode::None
        };
        let (consumed, produced, status) = encoder.compress(&data[pos..end], &mut out, flush).unwrap();
        pos += consumed;
        compressed.extend_from_slice(&out[..produced]);
        if status == Status::StreamEnd {
            return compressed;
        }
    }
}

/// Decompress with `step`-byte input pieces and a `room`-byte output.
fn decode_in_pieces(data: &[u8], step: usize, room: usize) -> Vec<u8> {
    let mut decoder = Decoder::raw();
    let mut plain = Vec::new();
    let mut out = vec![0u8; room];
    let mut pos = 0;
    loop {
        let end = (pos + step).min(data.len());
        let (consumed, produced, status) = decoder.decompress(&data[pos..end], &mut out).unwrap();
        pos += consumed;
        plain.extend_from_slice(&out[..produced]);
        match status {
            Status::StreamEnd => return plain,
            Status::BufError => assert!(pos < data.len(), "stream ended early"),
            _ => {}
        }
    }
}

fn check_shape(name: &str, data: &[u8]) {
    for (level, step, room) in [(1, 1, 7), (6, 333, 1), (9, 4096, 64), (0, 70_000, 3)] {
        let compressed = encode_in_pieces(data, level, step, room);
        assert_eq!(inflate(&compressed).unwrap(), data, "{} at level {}", name, level);
        assert_eq!(
            decode_in_pieces(&compressed, step.min(97), room.max(2)),
            data,
            "{} streamed at level {}",
            name,
            level
        );
    }
}

#[test]
fn test_tiny_inputs() {
    check_shape("empty", b"");
    check_shape("one byte", b"A");
    check_shape("two bytes", b"AB");
    check_shape("short match", b"abcabc");
}

#[test]
fn test_uniform_bytes() {
    let zeros = vec![0u8; 1000];
    check_shape("zeros", &zeros);
    assert!(deflate(&zeros, 6).unwrap().len() < zeros.len() / 10);

    let ones = vec![255u8; 5000];
    check_shape("ones", &ones);
    assert!(deflate(&ones, 6).unwrap().len() < ones.len() / 20);
}

#[test]
fn test_match_length_limits() {
    // Runs of exactly the longest match, then one past it.
    check_shape("258 run", &[42u8; 258 * 10]);
    check_shape("259 run", &[42u8; 259 * 7]);
    let alternating: Vec<u8> = (0..1000).map(|i| if i % 2 == 0 { b'A' } else { b'B' }).collect();
    check_shape("alternating", &alternating);
}

#[test]
fn test_all_literals() {
    // LCG noise leaves little for LZ77 to find.
    let mut seed: u32 = 0x2545_F491;
    let input: Vec<u8> = (0..20_000)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as u8
        })
        .collect();

    for level in [1, 6, 9] {
        let compressed = deflate(&input, level).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input);
        // Never worse than stored blocks.
        assert!(compressed.len() <= input.len() + 6 * (input.len() / 16_000 + 1) + 1);
    }
}

#[test]
fn test_window_edge_distances() {
    // A match exactly one window back, and one just beyond it.
    let pattern = b"PATTERN_TO_MATCH";
    for gap in [32_768, 32_769] {
        let mut input = vec![0u8; gap + pattern.len()];
        input[..pattern.len()].copy_from_slice(pattern);
        input[gap..].copy_from_slice(pattern);
        check_shape("far match", &input);
    }
}

#[test]
fn test_large_text() {
    let input: Vec<u8> = b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(1 << 20)
        .collect();
    let compressed = encode_in_pieces(&input, 5, 10_000, 4096);
    assert_eq!(decode_in_pieces(&compressed, 1000, 50_000), input);
}

#[test]
fn test_byte_ramps_and_text() {
    let ramp: Vec<u8> = (0..256).flat_map(|i| [i as u8; 10]).collect();
    check_shape("ramp", &ramp);
    let cycle: Vec<u8> = (0..=255).cycle().take(5000).collect();
    check_shape("cycle", &cycle);
    let text = "Grüße aus Köln! Ça va? Ελληνικά, 日本語のテキスト。".repeat(40);
    check_shape("utf-8", text.as_bytes());
}

#[test]
fn test_level_zero_expands() {
    let input = b"Hello, world! This is a test of DEFLATE compression with various levels.";
    assert!(deflate(input, 0).unwrap().len() > input.len());
}
