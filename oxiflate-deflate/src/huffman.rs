//! Canonical Huffman coding for DEFLATE (RFC 1951).
//!
//! DEFLATE transmits only code lengths; codes of the same length are assigned
//! consecutive values in symbol order. This module builds decoding tables
//! that work on a partially filled bit buffer, and length-limited code
//! lengths for the encoder.
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman trees)

use oxiflate_core::bitstream::reverse_bits;
use oxiflate_core::error::{FlateError, Result};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Maximum code length for the code-length alphabet.
pub const MAX_CODELEN_LENGTH: u8 = 7;

/// Size of the literal/length alphabet used by the encoder (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Result of decoding against a possibly short bit buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A complete code was found.
    Symbol {
        /// Decoded symbol.
        symbol: u16,
        /// Code length in bits.
        length: u8,
    },
    /// The buffered bits are a prefix of a longer code.
    NeedMore,
    /// No code matches.
    Invalid,
}

/// A canonical Huffman decoding table.
///
/// Codes up to `FAST_BITS` long resolve with a single table lookup. Longer
/// codes, and buffers holding fewer than `FAST_BITS` bits, walk the
/// canonical code space one bit at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// Direct lookup entries: `symbol << 4 | length`, 0 for "not here".
    fast: Vec<u16>,
    fast_bits: u8,
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// Symbols ordered by (length, symbol).
    symbols: Vec<u16>,
    max_length: u8,
}

impl HuffmanTable {
    /// Number of bits for the fast lookup table.
    const FAST_BITS: u8 = 9;

    /// Build a table from per-symbol code lengths (0 = unused).
    ///
    /// Incomplete codes are accepted; over-subscribed ones are rejected.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        let mut max_length = 0u8;
        for &len in lengths {
            if len as usize > MAX_CODE_LENGTH {
                return Err(FlateError::data(
                    0,
                    format!("code length {} exceeds {}", len, MAX_CODE_LENGTH),
                ));
            }
            if len > 0 {
                counts[len as usize] += 1;
                max_length = max_length.max(len);
            }
        }

        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(FlateError::data(0, "over-subscribed Huffman code"));
            }
        }

        let mut offsets = [0usize; MAX_CODE_LENGTH + 2];
        for len in 1..=MAX_CODE_LENGTH {
            offsets[len + 1] = offsets[len] + counts[len] as usize;
        }
        let mut symbols = vec![0u16; offsets[MAX_CODE_LENGTH + 1]];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                symbols[offsets[len as usize]] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        let fast_bits = Self::FAST_BITS.min(max_length);
        let mut fast = vec![0u16; 1usize << fast_bits];
        if max_length > 0 {
            let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
            let mut code = 0u16;
            for len in 1..=MAX_CODE_LENGTH {
                code = (code + counts[len - 1]) << 1;
                next_code[len] = code;
            }
            for (symbol, &len) in lengths.iter().enumerate() {
                if len == 0 {
                    continue;
                }
                let code = next_code[len as usize];
                next_code[len as usize] += 1;
                if len > fast_bits {
                    continue;
                }
                let reversed = reverse_bits(code, len) as usize;
                let entry = ((symbol as u16) << 4) | len as u16;
                for fill in 0..1usize << (fast_bits - len) {
                    fast[reversed | (fill << len)] = entry;
                }
            }
        }

        Ok(Self {
            fast,
            fast_bits,
            counts,
            symbols,
            max_length,
        })
    }

    /// Decode the next symbol from the low `available` bits of `bits`.
    #[inline]
    pub fn lookup(&self, bits: u64, available: u32) -> Lookup {
        if self.max_length == 0 {
            return Lookup::Invalid;
        }

        if available >= self.fast_bits as u32 {
            let entry = self.fast[(bits & ((1u64 << self.fast_bits) - 1)) as usize];
            if entry & 0xF != 0 {
                return Lookup::Symbol {
                    symbol: entry >> 4,
                    length: (entry & 0xF) as u8,
                };
            }
        }

        self.lookup_slow(bits, available)
    }

    fn lookup_slow(&self, bits: u64, available: u32) -> Lookup {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..=self.max_length as u32 {
            if len > available {
                return Lookup::NeedMore;
            }
            code |= ((bits >> (len - 1)) & 1) as i32;
            let count = self.counts[len as usize] as i32;
            if code - first < count {
                return Lookup::Symbol {
                    symbol: self.symbols[(index + code - first) as usize],
                    length: len as u8,
                };
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Lookup::Invalid
    }

    /// Number of table entries built for this code.
    pub fn entries(&self) -> usize {
        self.fast.len() + self.symbols.len()
    }

    /// Whether `symbol` has a code.
    pub fn has_symbol(&self, symbol: u16) -> bool {
        self.symbols.contains(&symbol)
    }
}

/// Compute code lengths for `freqs`, limited to `max_length` bits.
///
/// At least two symbols always receive a code so that the result is a
/// complete prefix code; missing ones are taken from the lowest unused
/// symbols.
pub fn build_lengths(freqs: &[u32], max_length: u8) -> Vec<u8> {
    let n = freqs.len();
    let mut lengths = vec![0u8; n];

    let mut leaves: Vec<(u32, usize)> = freqs
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(i, &f)| (f, i))
        .collect();
    for symbol in 0..n {
        if leaves.len() >= 2 {
            break;
        }
        if freqs[symbol] == 0 {
            leaves.push((0, symbol));
        }
    }
    leaves.sort_unstable();

    let m = leaves.len();
    if m == 0 {
        return lengths;
    }
    if m == 1 {
        lengths[leaves[0].1] = 1;
        return lengths;
    }

    // Two-queue Huffman construction: leaves are sorted, internal nodes are
    // created in non-decreasing weight order.
    let total = 2 * m - 1;
    let mut weight: Vec<u64> = Vec::with_capacity(total);
    weight.extend(leaves.iter().map(|&(f, _)| f.max(1) as u64));
    weight.resize(total, 0);
    let mut parent = vec![0usize; total];
    let mut next_leaf = 0;
    let mut next_internal = m;
    let mut created = m;

    let pick = |weight: &[u64], next_leaf: &mut usize, next_internal: &mut usize, created| {
        if *next_leaf < m && (*next_internal >= created || weight[*next_leaf] <= weight[*next_internal])
        {
            *next_leaf += 1;
            *next_leaf - 1
        } else {
            *next_internal += 1;
            *next_internal - 1
        }
    };

    while created < total {
        let a = pick(&weight, &mut next_leaf, &mut next_internal, created);
        let b = pick(&weight, &mut next_leaf, &mut next_internal, created);
        weight[created] = weight[a] + weight[b];
        parent[a] = created;
        parent[b] = created;
        created += 1;
    }

    let mut depth = vec![0usize; total];
    for node in (0..total - 1).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    // Count codes per length, folding overlong codes into `max_length`, then
    // repair the Kraft sum by lengthening shorter codes.
    let max = max_length as usize;
    let mut num_codes = vec![0u32; max + 1];
    for &d in &depth[..m] {
        num_codes[d.min(max)] += 1;
    }
    let mut kraft: u64 = (1..=max).map(|i| (num_codes[i] as u64) << (max - i)).sum();
    while kraft > 1u64 << max {
        num_codes[max] -= 1;
        for i in (1..max).rev() {
            if num_codes[i] != 0 {
                num_codes[i] -= 1;
                num_codes[i + 1] += 2;
                break;
            }
        }
        kraft -= 1;
    }

    // Least frequent symbols get the longest codes.
    let mut next = 0;
    for len in (1..=max).rev() {
        for _ in 0..num_codes[len] {
            lengths[leaves[next].1] = len as u8;
            next += 1;
        }
    }

    lengths
}

/// Canonical codes for `lengths`, already bit-reversed for LSB-first output.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut counts = [0u16; MAX_CODE_LENGTH + 1];
    for &len in lengths {
        counts[len as usize] += 1;
    }
    counts[0] = 0;

    let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
    let mut code = 0u16;
    for len in 1..=MAX_CODE_LENGTH {
        code = (code + counts[len - 1]) << 1;
        next_code[len] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                0
            } else {
                let code = next_code[len as usize];
                next_code[len as usize] += 1;
                reverse_bits(code, len)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft_sum(lengths: &[u8], max: u8) -> u64 {
        lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u64 << (max - l))
            .sum()
    }

    #[test]
    fn test_table_simple_decode() {
        // A=0 (1 bit), B=10, C=11 (MSB-first); in stream order B is bits 0,1.
        let table = HuffmanTable::from_lengths(&[1, 2, 2]).unwrap();
        assert_eq!(table.lookup(0b0, 1), Lookup::Symbol { symbol: 0, length: 1 });
        assert_eq!(table.lookup(0b01, 2), Lookup::Symbol { symbol: 1, length: 2 });
        assert_eq!(table.lookup(0b11, 2), Lookup::Symbol { symbol: 2, length: 2 });
        assert_eq!(table.lookup(0b1, 1), Lookup::NeedMore);
    }

    #[test]
    fn test_table_rejects_oversubscribed() {
        assert!(HuffmanTable::from_lengths(&[1, 1, 1]).is_err());
    }

    #[test]
    fn test_table_incomplete_code_is_invalid_past_end() {
        let table = HuffmanTable::from_lengths(&[2, 2, 2]).unwrap();
        // Code 11 is unassigned.
        assert_eq!(table.lookup(0b11, 2), Lookup::Invalid);
    }

    #[test]
    fn test_table_long_codes_use_slow_path() {
        let mut lengths = vec![0u8; 20];
        for (i, len) in lengths.iter_mut().enumerate() {
            *len = (i as u8 + 1).min(15);
        }
        // Lengths 1..=15 once each plus extra 15s is over-subscribed; trim.
        lengths.truncate(16);
        lengths[15] = 15;
        let table = HuffmanTable::from_lengths(&lengths).unwrap();
        let codes = canonical_codes(&lengths);
        for (symbol, &len) in lengths.iter().enumerate() {
            let got = table.lookup(codes[symbol] as u64, 15);
            assert_eq!(
                got,
                Lookup::Symbol {
                    symbol: symbol as u16,
                    length: len
                }
            );
        }
    }

    #[test]
    fn test_empty_table_is_invalid() {
        let table = HuffmanTable::from_lengths(&[0, 0, 0]).unwrap();
        assert_eq!(table.lookup(0, 16), Lookup::Invalid);
    }

    #[test]
    fn test_build_lengths_complete_and_limited() {
        let mut freqs = vec![0u32; 286];
        // Fibonacci-like frequencies force deep trees.
        let (mut a, mut b) = (1u32, 1u32);
        for f in freqs.iter_mut().take(30) {
            *f = a;
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        let lengths = build_lengths(&freqs, 15);
        assert!(lengths.iter().all(|&l| l <= 15));
        assert_eq!(kraft_sum(&lengths, 15), 1 << 15);
        assert!(lengths[..30].iter().all(|&l| l > 0));
        assert!(lengths[30..].iter().all(|&l| l == 0));
    }

    #[test]
    fn test_build_lengths_codelen_limit() {
        let freqs: Vec<u32> = (0..19).map(|i| 1u32 << i.min(18)).collect();
        let lengths = build_lengths(&freqs, 7);
        assert!(lengths.iter().all(|&l| l <= 7 && l > 0));
        assert_eq!(kraft_sum(&lengths, 7), 1 << 7);
    }

    #[test]
    fn test_build_lengths_single_symbol_gets_partner() {
        let mut freqs = vec![0u32; 30];
        freqs[5] = 10;
        let lengths = build_lengths(&freqs, 15);
        assert_eq!(lengths[5], 1);
        assert_eq!(lengths.iter().filter(|&&l| l == 1).count(), 2);
    }

    #[test]
    fn test_build_lengths_all_zero() {
        let lengths = build_lengths(&[0u32; 30], 15);
        // Two placeholder codes keep the tree complete.
        assert_eq!(lengths.iter().filter(|&&l| l > 0).count(), 2);
    }

    #[test]
    fn test_frequent_symbols_get_short_codes() {
        let mut freqs = vec![1u32; 10];
        freqs[3] = 1000;
        let lengths = build_lengths(&freqs, 15);
        assert!(lengths.iter().all(|&l| l >= lengths[3]));
    }

    #[test]
    fn test_canonical_codes_rfc_example() {
        // RFC 1951 section 3.2.2: lengths (3,3,3,3,3,2,4,4).
        let lengths = [3u8, 3, 3, 3, 3, 2, 4, 4];
        let codes = canonical_codes(&lengths);
        let msb_first: Vec<u16> = codes
            .iter()
            .zip(lengths.iter())
            .map(|(&c, &l)| reverse_bits(c, l))
            .collect();
        assert_eq!(msb_first, vec![0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111]);
    }
}
