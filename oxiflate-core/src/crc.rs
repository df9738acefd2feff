//! CRC-32 (ISO 3309) as used by the gzip trailer and header CRC.
//!
//! Long inputs go through slicing-by-8 tables, processing 8 bytes per step.
//! Short inputs use the single-table loop.
//!
//! [`crc32_combine`] merges two CRCs computed over adjacent ranges without
//! touching the data again, using polynomial arithmetic over GF(2).

/// Reflected CRC-32 polynomial.
const POLY: u32 = 0xEDB88320;

/// CRC-32 slicing-by-8 lookup tables. Table 0 is the classic byte table.
const CRC32_TABLE_SLICE: [[u32; 256]; 8] = {
    let mut tables = [[0u32; 256]; 8];

    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut t = 1;
    while t < 8 {
        let mut i = 0usize;
        while i < 256 {
            let prev = tables[t - 1][i];
            tables[t][i] = tables[0][(prev & 0xFF) as usize] ^ (prev >> 8);
            i += 1;
        }
        t += 1;
    }

    tables
};

/// `x^(2^k) mod p` for k in 0..32, used by [`crc32_combine`].
const X2N_TABLE: [u32; 32] = {
    let mut table = [0u32; 32];
    let mut p: u32 = 1 << 30;
    table[0] = p;
    let mut n = 1;
    while n < 32 {
        p = multmodp(p, p);
        table[n] = p;
        n += 1;
    }
    table
};

/// Multiply `a` by `b` modulo the CRC polynomial (reflected bit order).
const fn multmodp(a: u32, mut b: u32) -> u32 {
    let mut m: u32 = 1 << 31;
    let mut p: u32 = 0;
    loop {
        if a & m != 0 {
            p ^= b;
            if a & (m - 1) == 0 {
                break;
            }
        }
        m >>= 1;
        b = if b & 1 != 0 { (b >> 1) ^ POLY } else { b >> 1 };
    }
    p
}

/// `x^(n * 2^k) mod p`.
fn x2nmodp(mut n: u64, mut k: u32) -> u32 {
    let mut p: u32 = 1 << 31;
    while n != 0 {
        if n & 1 != 0 {
            p = multmodp(X2N_TABLE[(k & 31) as usize], p);
        }
        n >>= 1;
        k += 1;
    }
    p
}

/// Continue a finalized CRC-32 value over `data`.
///
/// `crc32(0, data)` is the CRC of `data`; `crc32(crc32(0, a), b)` is the CRC
/// of `a ++ b`.
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    let mut c = !crc;
    if data.len() >= 16 {
        c = crc32_slice8(c, data);
    } else {
        c = crc32_bytes(c, data);
    }
    !c
}

/// CRC of `A ++ B` from `crc1 = crc(A)`, `crc2 = crc(B)` and `len2 = len(B)`.
pub fn crc32_combine(crc1: u32, crc2: u32, len2: u64) -> u32 {
    multmodp(x2nmodp(len2, 3), crc1) ^ crc2
}

#[inline]
fn crc32_bytes(mut c: u32, data: &[u8]) -> u32 {
    for &byte in data {
        c = CRC32_TABLE_SLICE[0][((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c
}

#[inline]
fn crc32_slice8(mut c: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(8);
    for bytes in &mut chunks {
        let x = c ^ u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        c = CRC32_TABLE_SLICE[7][(x & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[6][((x >> 8) & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[5][((x >> 16) & 0xFF) as usize]
            ^ CRC32_TABLE_SLICE[4][(x >> 24) as usize]
            ^ CRC32_TABLE_SLICE[3][bytes[4] as usize]
            ^ CRC32_TABLE_SLICE[2][bytes[5] as usize]
            ^ CRC32_TABLE_SLICE[1][bytes[6] as usize]
            ^ CRC32_TABLE_SLICE[0][bytes[7] as usize];
    }
    crc32_bytes(c, chunks.remainder())
}

/// CRC-32 calculator (ISO 3309).
///
/// - Polynomial: 0x04C11DB7 (reflected: 0xEDB88320)
/// - Initial value: 0xFFFFFFFF
/// - Final XOR: 0xFFFFFFFF
///
/// # Example
///
/// ```
/// use oxiflate_core::crc::Crc32;
///
/// let mut crc = Crc32::new();
/// crc.update(b"Hello, World!");
/// assert_eq!(crc.finalize(), 0xEC4AC3D0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32 {
    value: u32,
}

impl Crc32 {
    /// Create a new CRC-32 calculator.
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Resume from a previously finalized value.
    pub fn from_value(value: u32) -> Self {
        Self { value }
    }

    /// Reset the CRC to its initial state.
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.value = crc32(self.value, data);
    }

    /// Current CRC value.
    #[inline(always)]
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Finalize and return the CRC value.
    #[inline(always)]
    pub fn finalize(self) -> u32 {
        self.value
    }

    /// Compute CRC-32 for a slice in one call.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        crc32(0, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(Crc32::compute(b""), 0);
        assert_eq!(crc32(0x1234_5678, b""), 0x1234_5678);
    }

    #[test]
    fn test_crc32_check() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_crc32_hello_world() {
        assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
    }

    #[test]
    fn test_crc32_incremental() {
        let mut crc = Crc32::new();
        crc.update(b"Hello, ");
        crc.update(b"World!");
        assert_eq!(crc.finalize(), 0xEC4AC3D0);
    }

    #[test]
    fn test_slice8_matches_bytewise() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 31 + 7) as u8).collect();
        for len in [0, 1, 7, 8, 15, 16, 17, 63, 64, 999, 1000] {
            let fast = crc32_slice8(0xFFFF_FFFF, &data[..len]);
            let slow = crc32_bytes(0xFFFF_FFFF, &data[..len]);
            assert_eq!(fast, slow, "mismatch at length {}", len);
        }
    }

    #[test]
    fn test_crc32_combine_hello_world() {
        let a = Crc32::compute(b"Hello ");
        let b = Crc32::compute(b"World");
        assert_eq!(crc32_combine(a, b, 5), Crc32::compute(b"Hello World"));
    }

    #[test]
    fn test_crc32_combine_empty_second() {
        let a = Crc32::compute(b"abc");
        assert_eq!(crc32_combine(a, 0, 0), a);
    }

    #[test]
    fn test_crc32_combine_empty_first() {
        let b = Crc32::compute(b"xyz");
        assert_eq!(crc32_combine(0, b, 3), b);
    }

    #[test]
    fn test_crc32_combine_long() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i ^ (i >> 7)) as u8).collect();
        let (a, b) = data.split_at(31_337);
        let combined = crc32_combine(Crc32::compute(a), Crc32::compute(b), b.len() as u64);
        assert_eq!(combined, Crc32::compute(&data));
    }

    #[test]
    fn test_x2n_table_start() {
        assert_eq!(X2N_TABLE[0], 1 << 30);
        assert_eq!(X2N_TABLE[1], 1 << 29);
        assert_eq!(X2N_TABLE[2], 1 << 27);
    }
}
