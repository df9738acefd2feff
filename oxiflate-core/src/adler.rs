//! Adler-32 checksum (RFC 1950), used by the zlib trailer and dictionary ids.

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Largest n such that 255n(n+1)/2 + (n+1)(ADLER_MOD-1) fits in 32 bits.
const NMAX: usize = 5552;

/// Continue an Adler-32 value over `data`.
///
/// `adler32(1, data)` is the checksum of `data`.
pub fn adler32(adler: u32, data: &[u8]) -> u32 {
    let mut a = adler & 0xFFFF;
    let mut b = adler >> 16;

    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }

    (b << 16) | a
}

/// Adler-32 of `A ++ B` from `adler1 = adler(A)`, `adler2 = adler(B)` and
/// `len2 = len(B)`.
pub fn adler32_combine(adler1: u32, adler2: u32, len2: u64) -> u32 {
    let base = ADLER_MOD as u64;
    let rem = len2 % base;
    let mut sum1 = (adler1 & 0xFFFF) as u64;
    let mut sum2 = (rem * sum1) % base;
    sum1 += (adler2 & 0xFFFF) as u64 + base - 1;
    sum2 += ((adler1 >> 16) & 0xFFFF) as u64 + ((adler2 >> 16) & 0xFFFF) as u64 + base - rem;
    if sum1 >= base {
        sum1 -= base;
    }
    if sum1 >= base {
        sum1 -= base;
    }
    if sum2 >= base << 1 {
        sum2 -= base << 1;
    }
    if sum2 >= base {
        sum2 -= base;
    }
    (sum1 | (sum2 << 16)) as u32
}

/// Adler-32 checksum calculator.
///
/// Faster than CRC-32 but weaker against short burst errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adler32 {
    value: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { value: 1 }
    }

    /// Resume from a previously finalized value.
    pub fn from_value(value: u32) -> Self {
        Self { value }
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        self.value = adler32(self.value, data);
    }

    /// Current checksum value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Compute Adler-32 checksum of data in one shot.
    pub fn checksum(data: &[u8]) -> u32 {
        adler32(1, data)
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
