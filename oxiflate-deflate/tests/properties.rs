//! Property tests for the codec.

use oxiflate_core::checksum::{ChecksumKind, combine, update};
use oxiflate_core::traits::{Compressor, Decompressor};
use oxiflate_core::{FlushMode, Status, StreamBuffers};
use oxiflate_deflate::Strategy as MatchStrategy;
use oxiflate_deflate::{Decoder, DecoderConfig, Encoder, EncoderConfig, Wrapper};
use proptest::prelude::*;

fn wrapper() -> impl Strategy<Value = Wrapper> {
    prop_oneof![Just(Wrapper::Raw), Just(Wrapper::Zlib), Just(Wrapper::Gzip)]
}

fn strategy() -> impl Strategy<Value = MatchStrategy> {
    prop_oneof![
        Just(MatchStrategy::Default),
        Just(MatchStrategy::Filtered),
        Just(MatchStrategy::HuffmanOnly),
        Just(MatchStrategy::Rle),
        Just(MatchStrategy::Fixed),
    ]
}

/// Bytes with runs and repeats so the matcher has work to do.
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec((any::<u8>(), 1usize..40), 0..120).prop_map(|runs| {
        let mut data = Vec::new();
        for (i, (byte, len)) in runs.into_iter().enumerate() {
            if i % 3 == 2 && data.len() > 8 {
                let start = data.len() / 2;
                let copy: Vec<u8> = data[start..].iter().take(len).copied().collect();
                data.extend(copy);
            } else {
                data.extend(std::iter::repeat_n(byte, len));
            }
        }
        data
    })
}

fn decoder_for(wrapper: Wrapper) -> Decoder {
    Decoder::new(DecoderConfig::new().wrapper(wrapper)).unwrap()
}

proptest! {
    #[test]
    fn roundtrip(data in payload(), level in 0u8..=9, strategy in strategy(), wrapper in wrapper()) {
        let config = EncoderConfig::new().wrapper(wrapper).level(level).strategy(strategy);
        let compressed = Encoder::new(config).unwrap().compress_all(&data).unwrap();
        let plain = decoder_for(wrapper).decompress_all(&compressed).unwrap();
        prop_assert_eq!(plain, data);
    }

    #[test]
    fn one_finish_call_fits_the_bound(data in payload(), level in 0u8..=9, wrapper in wrapper()) {
        let config = EncoderConfig::new().wrapper(wrapper).level(level);
        let mut encoder = Encoder::new(config).unwrap();
        let mut out = vec![0u8; encoder.bound(data.len() as u64) as usize];
        let mut buffers = StreamBuffers::new(&data, &mut out);
        let status = encoder.process(&mut buffers, FlushMode::Finish).unwrap();
        prop_assert_eq!(status, Status::StreamEnd);
        prop_assert_eq!(buffers.input_consumed(), data.len());
    }

    #[test]
    fn random_bytes_roundtrip(data in prop::collection::vec(any::<u8>(), 0..3000), level in 0u8..=9) {
        let compressed = oxiflate_deflate::deflate(&data, level).unwrap();
        prop_assert_eq!(oxiflate_deflate::inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn combine_matches_concatenation(
        a in prop::collection::vec(any::<u8>(), 0..512),
        b in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        for kind in [ChecksumKind::Crc32, ChecksumKind::Adler32] {
            let init = oxiflate_core::checksum::identity(kind);
            let whole = update(kind, update(kind, init, &a), &b);
            let joined = combine(kind, update(kind, init, &a), update(kind, init, &b), b.len() as u64);
            prop_assert_eq!(joined, whole);
        }
    }

    #[test]
    fn input_split_does_not_change_output(data in payload(), split in any::<prop::sample::Index>()) {
        let whole = oxiflate_deflate::zlib_compress(&data, 6).unwrap();
        let cut = split.index(whole.len() + 1);

        let mut decoder = Decoder::zlib();
        let mut plain = Vec::new();
        let mut out = vec![0u8; 1 << 16];
        let (consumed, produced, _) = decoder.decompress(&whole[..cut], &mut out).unwrap();
        prop_assert_eq!(consumed, cut);
        plain.extend_from_slice(&out[..produced]);
        let (_, produced, status) = decoder.decompress(&whole[cut..], &mut out).unwrap();
        plain.extend_from_slice(&out[..produced]);
        prop_assert_eq!(status, Status::StreamEnd);
        prop_assert_eq!(plain, data);
    }

    #[test]
    fn corrupted_streams_never_panic(data in payload(), flips in prop::collection::vec((any::<prop::sample::Index>(), 1u8..=255), 1..4)) {
        let mut compressed = oxiflate_deflate::zlib_compress(&data, 6).unwrap();
        for (at, mask) in flips {
            let i = at.index(compressed.len());
            compressed[i] ^= mask;
        }
        // Any outcome but a panic is acceptable.
        let _ = Decoder::zlib().decompress_all(&compressed);
    }
}
