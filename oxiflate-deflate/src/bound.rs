//! Worst-case compressed size.
//!
//! The encoder never emits a block larger than its stored form, and a stored
//! block costs at most 42 bits on top of its payload (3 header bits, up to 7
//! alignment bits, LEN and NLEN). Every block but the last covers at least
//! [`MIN_BLOCK_SPAN`] input bytes, which bounds the number of blocks.

use crate::block::MIN_BLOCK_SPAN;
use crate::config::{EncoderConfig, Wrapper};

/// zlib framing: 2-byte header, 4-byte dictionary id, 4-byte Adler-32.
const ZLIB_OVERHEAD: u64 = 2 + 4 + 4;

/// gzip trailer: CRC-32 and ISIZE.
const GZIP_TRAILER: u64 = 8;

/// Upper bound on the output of compressing `input_len` bytes in one
/// `Finish` call with `config`.
pub fn compress_bound(input_len: u64, config: &EncoderConfig) -> u64 {
    let span = config.symbol_capacity().min(MIN_BLOCK_SPAN) as u64;
    let blocks = input_len / span + 1;
    let deflate = input_len + 6 * blocks + 1;

    let wrapper = match config.wrapper {
        Wrapper::Raw | Wrapper::Auto => 0,
        Wrapper::Zlib => ZLIB_OVERHEAD,
        Wrapper::Gzip => {
            let header = config
                .header
                .as_ref()
                .map_or(10, |header| header.encoded_len() as u64);
            header + GZIP_TRAILER
        }
    };

    deflate + wrapper
}

/// zlib's quick estimate for the default configuration.
pub fn zlib_bound(input_len: u64) -> u64 {
    input_len + (input_len >> 12) + (input_len >> 14) + (input_len >> 25) + 13
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzip::GzipHeader;

    #[test]
    fn test_bound_is_monotone() {
        let config = EncoderConfig::default();
        let mut last = 0;
        for len in (0..200_000u64).step_by(997) {
            let bound = compress_bound(len, &config);
            assert!(bound >= last);
            assert!(bound > len);
            last = bound;
        }
    }

    #[test]
    fn test_wrapper_overhead() {
        let raw = compress_bound(1000, &EncoderConfig::new().wrapper(Wrapper::Raw));
        let zlib = compress_bound(1000, &EncoderConfig::new());
        let gzip = compress_bound(1000, &EncoderConfig::new().wrapper(Wrapper::Gzip));
        assert_eq!(zlib - raw, 10);
        assert_eq!(gzip - raw, 18);

        let named = EncoderConfig::new()
            .wrapper(Wrapper::Gzip)
            .header(GzipHeader::new().name("a.txt").with_crc16(true));
        assert_eq!(compress_bound(1000, &named) - raw, 18 + 6 + 2);
    }

    #[test]
    fn test_small_mem_level_allows_more_blocks() {
        let small = compress_bound(100_000, &EncoderConfig::new().mem_level(1));
        let large = compress_bound(100_000, &EncoderConfig::new().mem_level(9));
        assert!(small > large);
    }

    #[test]
    fn test_zlib_bound() {
        assert_eq!(zlib_bound(0), 13);
        assert_eq!(zlib_bound(1 << 14), (1 << 14) + 4 + 1 + 13);
    }
}
