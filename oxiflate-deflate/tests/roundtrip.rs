//! Round-trip coverage across levels, strategies, wrappers and framing
//! options.

use oxiflate_core::checksum::{ChecksumKind, update};
use oxiflate_core::traits::{Compressor, Decompressor};
use oxiflate_core::{FlushMode, Status, StreamBuffers};
use oxiflate_deflate::{
    Decoder, DecoderConfig, Encoder, EncoderConfig, GzipHeader, Strategy, Wrapper,
};

const STRATEGIES: [Strategy; 5] = [
    Strategy::Default,
    Strategy::Filtered,
    Strategy::HuffmanOnly,
    Strategy::Rle,
    Strategy::Fixed,
];

fn sample() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..400u32 {
        data.extend_from_slice(format!("line {} of the sample, value {}\n", i, i * i % 97).as_bytes());
    }
    data.extend((0..2000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8));
    data.extend(std::iter::repeat_n(b'r', 700));
    data
}

fn decoder_for(wrapper: Wrapper) -> Decoder {
    Decoder::new(DecoderConfig::new().wrapper(wrapper)).unwrap()
}

/// Encode in one `Finish` call using exactly the advertised bound.
fn encode_bounded(encoder: &mut Encoder, data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; encoder.bound(data.len() as u64) as usize];
    let mut buffers = StreamBuffers::new(data, &mut out);
    let status = encoder.process(&mut buffers, FlushMode::Finish).unwrap();
    assert_eq!(status, Status::StreamEnd);
    let produced = buffers.output_produced();
    out.truncate(produced);
    out
}

#[test]
fn every_level_strategy_and_wrapper() {
    let data = sample();
    for wrapper in [Wrapper::Raw, Wrapper::Zlib, Wrapper::Gzip] {
        for strategy in STRATEGIES {
            for level in 0..=9 {
                let config = EncoderConfig::new()
                    .wrapper(wrapper)
                    .strategy(strategy)
                    .level(level);
                let mut encoder = Encoder::new(config).unwrap();
                let compressed = encoder.compress_all(&data).unwrap();
                let plain = decoder_for(wrapper).decompress_all(&compressed).unwrap();
                assert_eq!(
                    plain, data,
                    "wrapper {:?} strategy {:?} level {}",
                    wrapper, strategy, level
                );
            }
        }
    }
}

#[test]
fn single_finish_call_fits_the_bound() {
    let inputs = [Vec::new(), b"x".to_vec(), sample()];
    for data in &inputs {
        for wrapper in [Wrapper::Raw, Wrapper::Zlib, Wrapper::Gzip] {
            for level in [0, 1, 6, 9] {
                let config = EncoderConfig::new().wrapper(wrapper).level(level);
                let compressed = encode_bounded(&mut Encoder::new(config).unwrap(), data);
                let plain = decoder_for(wrapper).decompress_all(&compressed).unwrap();
                assert_eq!(&plain, data);
            }
        }
    }
}

#[test]
fn small_windows_roundtrip() {
    let data = sample();
    for bits in [8, 9, 10, 12] {
        let config = EncoderConfig::new().wrapper(Wrapper::Zlib).window_bits(bits);
        let compressed = Encoder::new(config).unwrap().compress_all(&data).unwrap();
        // An 8-bit request is written as a 9-bit window.
        let expected_cinfo = bits.max(9) - 8;
        assert_eq!(compressed[0] >> 4, expected_cinfo);

        let decoder_config = DecoderConfig::new().wrapper(Wrapper::Zlib).window_bits(bits.max(9));
        let plain = Decoder::new(decoder_config)
            .unwrap()
            .decompress_all(&compressed)
            .unwrap();
        assert_eq!(plain, data);
    }
}

#[test]
fn gzip_header_fields_survive() {
    let header = GzipHeader::new()
        .name("report.txt")
        .comment("nightly build")
        .extra(b"AB\x02\x00hi".to_vec())
        .mtime(1_700_000_000)
        .with_crc16(true);
    let config = EncoderConfig::new().wrapper(Wrapper::Gzip).header(header);
    let compressed = Encoder::new(config).unwrap().compress_all(b"payload").unwrap();
    assert_eq!(compressed[3] & 0x1E, 0x1E);

    let mut decoder = Decoder::gzip();
    assert_eq!(decoder.decompress_all(&compressed).unwrap(), b"payload");
    let seen = decoder.header().unwrap();
    assert!(seen.done);
    assert_eq!(seen.name.as_deref(), Some("report.txt"));
    assert_eq!(seen.comment.as_deref(), Some("nightly build"));
    assert_eq!(seen.extra.as_deref(), Some(&b"AB\x02\x00hi"[..]));
    assert_eq!(seen.mtime, 1_700_000_000);

    // A damaged header CRC is reported.
    let mut damaged = compressed.clone();
    let crc_at = 10 + 2 + 6 + "report.txt".len() + 1 + "nightly build".len() + 1;
    damaged[crc_at] ^= 0x01;
    let err = Decoder::gzip().decompress_all(&damaged).unwrap_err();
    assert!(err.to_string().contains("header crc mismatch"));
}

#[test]
fn multi_member_gzip_keeps_position() {
    let parts: [&[u8]; 3] = [b"first member, ", b"second member, ", b"third"];

    let mut encoder = Encoder::gzip(6).unwrap();
    let mut stream = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            encoder.reset_keep_position();
        }
        stream.extend(encode_bounded(&mut encoder, part));
    }
    let whole = parts.concat();
    let crc = update(ChecksumKind::Crc32, 0, &whole);
    assert_eq!(encoder.checksum(), crc);
    assert_eq!(encoder.total_in(), whole.len() as u64);
    assert_eq!(encoder.total_out(), stream.len() as u64);

    let mut decoder = Decoder::gzip();
    let mut plain = Vec::new();
    let mut pos = 0;
    let mut out = vec![0u8; 256];
    loop {
        let mut buffers = StreamBuffers::new(&stream[pos..], &mut out);
        let status = decoder.process(&mut buffers).unwrap();
        pos += buffers.input_consumed();
        plain.extend_from_slice(buffers.produced());
        if status == Status::StreamEnd {
            if pos == stream.len() {
                break;
            }
            decoder.reset_keep_position();
        }
    }
    assert_eq!(plain, whole);
    assert_eq!(decoder.checksum(), crc);
    assert_eq!(decoder.total_in(), stream.len() as u64);
    assert_eq!(decoder.total_out(), whole.len() as u64);
}

#[test]
fn chunked_streaming_through_traits() {
    let data = sample();
    let mut encoder = Encoder::zlib(5).unwrap();
    let mut compressed = Vec::new();
    let mut out = vec![0u8; 97];
    for chunk in data.chunks(333) {
        let mut pos = 0;
        while pos < chunk.len() {
            let (consumed, produced, _) = encoder
                .compress(&chunk[pos..], &mut out, FlushMode::None)
                .unwrap();
            pos += consumed;
            compressed.extend_from_slice(&out[..produced]);
        }
    }
    loop {
        let (_, produced, status) = encoder.compress(&[], &mut out, FlushMode::Finish).unwrap();
        compressed.extend_from_slice(&out[..produced]);
        if status == Status::StreamEnd {
            break;
        }
    }
    assert!(Compressor::is_finished(&encoder));

    let mut decoder = Decoder::zlib();
    let mut plain = Vec::new();
    let mut pos = 0;
    let mut window = vec![0u8; 61];
    loop {
        let end = (pos + 13).min(compressed.len());
        let (consumed, produced, status) = decoder
            .decompress(&compressed[pos..end], &mut window)
            .unwrap();
        pos += consumed;
        plain.extend_from_slice(&window[..produced]);
        if status == Status::StreamEnd {
            break;
        }
    }
    assert!(Decompressor::is_finished(&decoder));
    assert_eq!(plain, data);

    Decompressor::reset(&mut decoder);
    assert!(!Decompressor::is_finished(&decoder));
    assert_eq!(decoder.decompress_all(&compressed).unwrap(), data);
}

#[test]
fn sync_flushes_are_decodable_midway() {
    let mut encoder = Encoder::raw(6).unwrap();
    let mut decoder = Decoder::raw();
    let mut out = vec![0u8; 4096];
    let mut plain = vec![0u8; 4096];
    for message in [&b"hello "[..], b"streaming ", b"world"] {
        let mut buffers = StreamBuffers::new(message, &mut out);
        encoder.process(&mut buffers, FlushMode::Sync).unwrap();
        let produced = buffers.output_produced();

        let mut buffers = StreamBuffers::new(&out[..produced], &mut plain);
        assert_eq!(decoder.process(&mut buffers).unwrap(), Status::Ok);
        assert_eq!(buffers.produced(), message);
    }
}
