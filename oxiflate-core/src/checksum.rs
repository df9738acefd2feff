//! Kind-dispatched checksum engine.
//!
//! Both checksums are exposed as pure functions of `(accumulator, bytes)` plus
//! an associative `combine`, so ranges may be checksummed independently (even
//! on different threads) and merged afterwards:
//!
//! ```
//! use oxiflate_core::checksum::{ChecksumKind, combine, identity, update};
//!
//! let kind = ChecksumKind::Crc32;
//! let a = update(kind, identity(kind), b"Hello ");
//! let b = update(kind, identity(kind), b"World");
//! let whole = update(kind, identity(kind), b"Hello World");
//! assert_eq!(combine(kind, a, b, 5), whole);
//! ```

use crate::adler::{adler32, adler32_combine};
use crate::crc::{crc32, crc32_combine};

/// Which checksum a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumKind {
    /// CRC-32 (gzip framing).
    Crc32,
    /// Adler-32 (zlib framing, dictionary ids).
    Adler32,
}

/// Checksum of the empty byte range.
pub const fn identity(kind: ChecksumKind) -> u32 {
    match kind {
        ChecksumKind::Crc32 => 0,
        ChecksumKind::Adler32 => 1,
    }
}

/// Extend `acc` over `data`.
#[inline]
pub fn update(kind: ChecksumKind, acc: u32, data: &[u8]) -> u32 {
    if data.is_empty() {
        return acc;
    }
    match kind {
        ChecksumKind::Crc32 => crc32(acc, data),
        ChecksumKind::Adler32 => adler32(acc, data),
    }
}

/// Merge the checksums of two adjacent ranges; `len_b` is the length of the
/// second range.
pub fn combine(kind: ChecksumKind, acc_a: u32, acc_b: u32, len_b: u64) -> u32 {
    match kind {
        ChecksumKind::Crc32 => crc32_combine(acc_a, acc_b, len_b),
        ChecksumKind::Adler32 => adler32_combine(acc_a, acc_b, len_b),
    }
}

/// Stateful accumulator that tracks the number of bytes seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum {
    kind: ChecksumKind,
    value: u32,
    len: u64,
}

impl Checksum {
    /// New accumulator at the identity value.
    pub fn new(kind: ChecksumKind) -> Self {
        Self {
            kind,
            value: identity(kind),
            len: 0,
        }
    }

    /// Checksum kind.
    pub fn kind(&self) -> ChecksumKind {
        self.kind
    }

    /// Current value.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether no bytes have been covered yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.value = update(self.kind, self.value, data);
        self.len += data.len() as u64;
    }

    /// Append another accumulator's range after this one.
    pub fn append(&mut self, other: &Checksum) {
        debug_assert_eq!(self.kind, other.kind);
        self.value = combine(self.kind, self.value, other.value, other.len);
        self.len += other.len;
    }

    /// Back to the identity value.
    pub fn reset(&mut self) {
        self.value = identity(self.kind);
        self.len = 0;
    }
}

/// Checksum `data` in `chunk_size` pieces on the rayon pool and merge the
/// results with [`combine`].
#[cfg(feature = "parallel")]
pub fn par_checksum(kind: ChecksumKind, data: &[u8], chunk_size: usize) -> u32 {
    use rayon::prelude::*;

    let chunk_size = chunk_size.max(1);
    data.par_chunks(chunk_size)
        .map(|chunk| {
            let mut acc = Checksum::new(kind);
            acc.update(chunk);
            acc
        })
        .collect::<Vec<_>>()
        .iter()
        .fold(Checksum::new(kind), |mut whole, part| {
            whole.append(part);
            whole
        })
        .value()
}
