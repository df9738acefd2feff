//! DEFLATE block assembly.
//!
//! Tokens are buffered together with the raw bytes they cover. When a block
//! is closed, the exact bit cost of the stored, fixed and dynamic
//! encodings is computed and the cheapest one is written. A block never
//! costs more than its stored form, which is what `compress_bound` relies
//! on.

use crate::config::Strategy;
use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, LITLEN_ALPHABET_SIZE,
    MAX_CODE_LENGTH, MAX_CODELEN_LENGTH, build_lengths, canonical_codes,
};
use crate::lz77::{MAX_MATCH, Token, try_alloc};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, distance_to_code,
    fixed_distance_codes, fixed_distance_lengths, fixed_litlen_codes, fixed_litlen_lengths,
    length_to_code,
};
use oxiflate_core::bitstream::BitSink;
use oxiflate_core::error::Result;
use tracing::trace;

/// Largest payload of a stored block.
pub const MAX_STORED: usize = 65535;

/// A block that is closed for size reasons covers at least this many bytes.
pub const MIN_BLOCK_SPAN: usize = MAX_STORED - MAX_MATCH + 1;

/// How a block was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// BTYPE 00.
    Stored,
    /// BTYPE 01.
    Fixed,
    /// BTYPE 10.
    Dynamic,
}

/// Code-length symbol with its extra bits: `(symbol, extra_bits, extra_value)`.
type CodelenSymbol = (u8, u8, u8);

/// Everything needed to write a dynamic block header.
struct DynamicTables {
    litlen_lengths: Vec<u8>,
    dist_lengths: Vec<u8>,
    codelen_lengths: Vec<u8>,
    symbols: Vec<CodelenSymbol>,
    hlit: usize,
    hdist: usize,
    hclen: usize,
}

impl DynamicTables {
    fn build(litlen_freq: &[u32], dist_freq: &[u32]) -> Self {
        let litlen_lengths = build_lengths(litlen_freq, MAX_CODE_LENGTH as u8);
        let dist_lengths = build_lengths(dist_freq, MAX_CODE_LENGTH as u8);

        let hlit = last_nonzero(&litlen_lengths).max(257);
        let hdist = last_nonzero(&dist_lengths).max(1);

        let mut combined = Vec::with_capacity(hlit + hdist);
        combined.extend_from_slice(&litlen_lengths[..hlit]);
        combined.extend_from_slice(&dist_lengths[..hdist]);
        let symbols = rle_encode_lengths(&combined);

        let mut codelen_freq = [0u32; CODELEN_ALPHABET_SIZE];
        for &(symbol, _, _) in &symbols {
            codelen_freq[symbol as usize] += 1;
        }
        let codelen_lengths = build_lengths(&codelen_freq, MAX_CODELEN_LENGTH);

        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&symbol| codelen_lengths[symbol] != 0)
            .map_or(4, |i| (i + 1).max(4));

        Self {
            litlen_lengths,
            dist_lengths,
            codelen_lengths,
            symbols,
            hlit,
            hdist,
            hclen,
        }
    }

    /// Bits for the header after BFINAL/BTYPE.
    fn header_bits(&self) -> u64 {
        let table: u64 = self
            .symbols
            .iter()
            .map(|&(symbol, extra_bits, _)| {
                self.codelen_lengths[symbol as usize] as u64 + extra_bits as u64
            })
            .sum();
        5 + 5 + 4 + 3 * self.hclen as u64 + table
    }

    fn write_header(&self, sink: &mut BitSink) {
        sink.put_bits((self.hlit - 257) as u32, 5);
        sink.put_bits((self.hdist - 1) as u32, 5);
        sink.put_bits((self.hclen - 4) as u32, 4);
        for &symbol in &CODE_LENGTH_ORDER[..self.hclen] {
            sink.put_bits(self.codelen_lengths[symbol] as u32, 3);
        }
        let codes = canonical_codes(&self.codelen_lengths);
        for &(symbol, extra_bits, extra_value) in &self.symbols {
            sink.put_bits(
                codes[symbol as usize] as u32,
                self.codelen_lengths[symbol as usize] as u32,
            );
            sink.put_bits(extra_value as u32, extra_bits as u32);
        }
    }
}

/// Index one past the last non-zero entry.
fn last_nonzero(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1)
}

/// Run-length encode code lengths with symbols 16, 17 and 18.
fn rle_encode_lengths(lengths: &[u8]) -> Vec<CodelenSymbol> {
    let mut symbols = Vec::new();
    let mut i = 0;

    while i < lengths.len() {
        let len = lengths[i];
        let run = lengths[i..].iter().take_while(|&&l| l == len).count();
        let mut left = run;

        if len == 0 {
            while left >= 11 {
                let n = left.min(138);
                symbols.push((18, 7, (n - 11) as u8));
                left -= n;
            }
            if left >= 3 {
                symbols.push((17, 3, (left - 3) as u8));
                left = 0;
            }
        } else {
            symbols.push((len, 0, 0));
            left -= 1;
            while left >= 3 {
                let n = left.min(6);
                symbols.push((16, 2, (n - 3) as u8));
                left -= n;
            }
        }
        symbols.extend(std::iter::repeat_n((len, 0, 0), left));

        i += run;
    }

    symbols
}

/// Tokens of the block under construction, plus the bytes they cover.
#[derive(Debug, Clone)]
pub struct BlockBuffer {
    tokens: Vec<Token>,
    raw: Vec<u8>,
    capacity: usize,
    litlen_freq: [u32; LITLEN_ALPHABET_SIZE],
    dist_freq: [u32; DISTANCE_ALPHABET_SIZE],
}

impl BlockBuffer {
    /// Buffer holding up to `capacity` tokens.
    pub fn new(capacity: usize) -> Result<Self> {
        let mut tokens = try_alloc(capacity, Token::Literal(0))?;
        tokens.clear();
        let mut raw = try_alloc(MAX_STORED, 0u8)?;
        raw.clear();
        let mut buffer = Self {
            tokens,
            raw,
            capacity,
            litlen_freq: [0; LITLEN_ALPHABET_SIZE],
            dist_freq: [0; DISTANCE_ALPHABET_SIZE],
        };
        buffer.clear();
        Ok(buffer)
    }

    /// Drop buffered tokens.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.raw.clear();
        self.litlen_freq.fill(0);
        self.dist_freq.fill(0);
        self.litlen_freq[END_OF_BLOCK as usize] = 1;
    }

    /// Append a token and the bytes it covers.
    pub fn push(&mut self, token: Token, bytes: &[u8]) {
        match token {
            Token::Literal(byte) => self.litlen_freq[byte as usize] += 1,
            Token::Match { length, distance } => {
                self.litlen_freq[length_to_code(length).0 as usize] += 1;
                self.dist_freq[distance_to_code(distance).0 as usize] += 1;
            }
        }
        self.tokens.push(token);
        self.raw.extend_from_slice(bytes);
    }

    /// Whether the block must be closed before the next token.
    pub fn is_full(&self) -> bool {
        self.tokens.len() >= self.capacity || self.raw.len() + MAX_MATCH > MAX_STORED
    }

    /// Whether no tokens are buffered.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Bytes covered by the buffered tokens.
    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    fn stored_bits(&self, partial_bits: u32) -> u64 {
        let pad = (8 - (partial_bits + 3) % 8) % 8;
        3 + pad as u64 + 32 + 8 * self.raw.len() as u64
    }

    /// Data bits (tokens and end-of-block) under the given code lengths.
    fn data_bits(&self, litlen_lengths: &[u8], dist_lengths: &[u8]) -> u64 {
        let litlen: u64 = self
            .litlen_freq
            .iter()
            .enumerate()
            .map(|(symbol, &freq)| {
                let extra = if symbol > 256 {
                    LENGTH_EXTRA_BITS[symbol - 257] as u64
                } else {
                    0
                };
                freq as u64 * (litlen_lengths[symbol] as u64 + extra)
            })
            .sum();
        let dist: u64 = self
            .dist_freq
            .iter()
            .enumerate()
            .map(|(code, &freq)| {
                freq as u64 * (dist_lengths[code] as u64 + DISTANCE_EXTRA_BITS[code] as u64)
            })
            .sum();
        litlen + dist
    }

    /// Close the block: write it in its cheapest form and clear the buffer.
    pub fn flush(
        &mut self,
        sink: &mut BitSink,
        last: bool,
        level: u8,
        strategy: Strategy,
    ) -> Result<BlockKind> {
        sink.try_reserve(self.raw.len() + 16)?;

        let stored = self.stored_bits(sink.partial_bits());
        let fixed_litlen = fixed_litlen_lengths();
        let fixed_dist = fixed_distance_lengths();
        let fixed = 3 + self.data_bits(&fixed_litlen, &fixed_dist);

        let dynamic = if level > 0 && strategy != Strategy::Fixed {
            let tables = DynamicTables::build(&self.litlen_freq, &self.dist_freq);
            let bits = 3
                + tables.header_bits()
                + self.data_bits(&tables.litlen_lengths, &tables.dist_lengths);
            Some((tables, bits))
        } else {
            None
        };

        let kind = if level == 0 {
            BlockKind::Stored
        } else {
            let dynamic_bits = dynamic.as_ref().map_or(u64::MAX, |(_, bits)| *bits);
            if stored <= fixed.min(dynamic_bits) {
                BlockKind::Stored
            } else if fixed <= dynamic_bits {
                BlockKind::Fixed
            } else {
                BlockKind::Dynamic
            }
        };

        trace!(
            ?kind,
            last,
            tokens = self.tokens.len(),
            raw = self.raw.len(),
            stored,
            fixed,
            "closing block"
        );

        match (kind, dynamic) {
            (BlockKind::Dynamic, Some((tables, _))) => {
                sink.put_bits(last as u32, 1);
                sink.put_bits(0b10, 2);
                tables.write_header(sink);
                let litlen_codes = canonical_codes(&tables.litlen_lengths);
                let dist_codes = canonical_codes(&tables.dist_lengths);
                self.write_tokens(
                    sink,
                    (&litlen_codes, &tables.litlen_lengths),
                    (&dist_codes, &tables.dist_lengths),
                );
            }
            (BlockKind::Fixed, _) | (BlockKind::Dynamic, None) => {
                sink.put_bits(last as u32, 1);
                sink.put_bits(0b01, 2);
                self.write_tokens(
                    sink,
                    (fixed_litlen_codes(), &fixed_litlen),
                    (fixed_distance_codes(), &fixed_dist),
                );
            }
            (BlockKind::Stored, _) => write_stored(sink, &self.raw, last),
        }

        self.clear();
        Ok(kind)
    }

    fn write_tokens(&self, sink: &mut BitSink, litlen: (&[u16], &[u8]), dist: (&[u16], &[u8])) {
        let (litlen_codes, litlen_lengths) = litlen;
        let (dist_codes, dist_lengths) = dist;
        let put = |sink: &mut BitSink, codes: &[u16], lengths: &[u8], symbol: usize| {
            sink.put_bits(codes[symbol] as u32, lengths[symbol] as u32);
        };

        for token in &self.tokens {
            match *token {
                Token::Literal(byte) => put(sink, litlen_codes, litlen_lengths, byte as usize),
                Token::Match { length, distance } => {
                    let (code, extra_bits, extra) = length_to_code(length);
                    put(sink, litlen_codes, litlen_lengths, code as usize);
                    sink.put_bits(extra as u32, extra_bits as u32);

                    let (code, extra_bits, extra) = distance_to_code(distance);
                    put(sink, dist_codes, dist_lengths, code as usize);
                    sink.put_bits(extra as u32, extra_bits as u32);
                }
            }
        }
        put(sink, litlen_codes, litlen_lengths, END_OF_BLOCK as usize);
    }
}

/// Write a stored block holding `raw` (at most 65535 bytes).
pub fn write_stored(sink: &mut BitSink, raw: &[u8], last: bool) {
    debug_assert!(raw.len() <= MAX_STORED);
    sink.put_bits(last as u32, 1);
    sink.put_bits(0b00, 2);
    sink.align();
    let len = raw.len() as u32;
    sink.put_bits(len, 16);
    sink.put_bits(!len & 0xFFFF, 16);
    sink.put_bytes(raw);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DecoderConfig, Wrapper};
    use crate::inflate::Decoder;
    use oxiflate_core::traits::Decompressor;

    fn drain(sink: &mut BitSink) -> Vec<u8> {
        sink.align();
        let mut out = vec![0u8; sink.pending_bytes()];
        let n = sink.drain_into(&mut out);
        out.truncate(n);
        out
    }

    fn inflate_raw(data: &[u8]) -> Vec<u8> {
        let mut decoder = Decoder::new(DecoderConfig::new().wrapper(Wrapper::Raw)).unwrap();
        decoder.decompress_all(data).unwrap()
    }

    fn literal_block(data: &[u8], capacity: usize) -> BlockBuffer {
        let mut block = BlockBuffer::new(capacity).unwrap();
        for &b in data {
            block.push(Token::Literal(b), &[b]);
        }
        block
    }

    #[test]
    fn test_rle_encode_lengths() {
        let mut lengths = vec![8u8; 10];
        lengths.extend_from_slice(&[0u8; 140]);
        lengths.extend_from_slice(&[5, 5]);
        let symbols = rle_encode_lengths(&lengths);
        assert_eq!(
            symbols,
            vec![
                (8, 0, 0),
                (16, 2, 3),
                (16, 2, 0),
                (18, 7, 127),
                (0, 0, 0),
                (0, 0, 0),
                (5, 0, 0),
                (5, 0, 0),
            ]
        );
    }

    #[test]
    fn test_random_data_is_stored() {
        let mut seed = 12345u32;
        let data: Vec<u8> = (0..4000)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (seed >> 16) as u8
            })
            .collect();
        let mut block = literal_block(&data, 16384);
        let mut sink = BitSink::new();
        let kind = block.flush(&mut sink, true, 6, Strategy::Default).unwrap();
        assert_eq!(kind, BlockKind::Stored);
        let bytes = drain(&mut sink);
        assert_eq!(bytes.len(), data.len() + 5);
        assert_eq!(inflate_raw(&bytes), data);
    }

    #[test]
    fn test_skewed_data_is_dynamic() {
        let data: Vec<u8> = b"aaaaaaabaaaaaaacaaaaaaab".repeat(100);
        let mut block = literal_block(&data, 16384);
        let mut sink = BitSink::new();
        let kind = block.flush(&mut sink, true, 6, Strategy::Default).unwrap();
        assert_eq!(kind, BlockKind::Dynamic);
        assert!(block.is_empty());
        assert_eq!(inflate_raw(&drain(&mut sink)), data);
    }

    #[test]
    fn test_fixed_strategy_never_dynamic() {
        let data: Vec<u8> = b"aaaaaaabaaaaaaac".repeat(100);
        let mut block = literal_block(&data, 16384);
        let mut sink = BitSink::new();
        let kind = block.flush(&mut sink, true, 6, Strategy::Fixed).unwrap();
        assert_eq!(kind, BlockKind::Fixed);
        assert_eq!(inflate_raw(&drain(&mut sink)), data);
    }

    #[test]
    fn test_empty_final_block_is_fixed() {
        let mut block = BlockBuffer::new(16).unwrap();
        let mut sink = BitSink::new();
        let kind = block.flush(&mut sink, true, 6, Strategy::Default).unwrap();
        assert_eq!(kind, BlockKind::Fixed);
        assert_eq!(drain(&mut sink), vec![0x03, 0x00]);
    }

    #[test]
    fn test_level_zero_is_stored() {
        let mut block = literal_block(b"aaaaaaaaaaaaaaaaaaaa", 64);
        let mut sink = BitSink::new();
        let kind = block.flush(&mut sink, true, 0, Strategy::Default).unwrap();
        assert_eq!(kind, BlockKind::Stored);
    }

    #[test]
    fn test_full_by_capacity_and_raw_cap() {
        let block = literal_block(b"abcd", 4);
        assert!(block.is_full());

        let mut block = BlockBuffer::new(1 << 20).unwrap();
        let run = vec![0u8; MAX_MATCH];
        while !block.is_full() {
            block.push(
                Token::Match {
                    length: MAX_MATCH as u16,
                    distance: 1,
                },
                &run,
            );
        }
        assert!(block.raw_len() <= MAX_STORED);
        assert!(block.raw_len() >= MIN_BLOCK_SPAN);
    }
}
