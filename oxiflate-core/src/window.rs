//! Sliding history window and preset dictionaries.
//!
//! The decoder keeps the last `1 << window_bits` output bytes in a [`Window`]
//! so that back-references can reach into earlier calls' output. A
//! [`Dictionary`] is a flat byte string treated as the tail of some earlier
//! stream; it is loaded into the window before any data is coded.

use crate::adler::adler32;

/// Smallest supported window, in bits.
pub const MIN_WINDOW_BITS: u8 = 8;

/// Largest supported window, in bits (32 KB).
pub const MAX_WINDOW_BITS: u8 = 15;

/// Circular history buffer.
///
/// Distance 1 is the most recently written byte; distance `len()` is the
/// oldest byte still held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    buffer: Vec<u8>,
    /// Next write index.
    position: usize,
    /// Valid bytes, up to capacity.
    size: usize,
    mask: usize,
}

impl Window {
    /// Create a window holding `1 << bits` bytes.
    pub fn new(bits: u8) -> Self {
        debug_assert!((MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&bits));
        let capacity = 1usize << bits;
        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid history bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no history is held.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.size = 0;
    }

    /// Append one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size < self.buffer.len() {
            self.size += 1;
        }
    }

    /// Append a run of bytes, keeping only the trailing `capacity` of them.
    pub fn extend(&mut self, bytes: &[u8]) {
        let capacity = self.buffer.len();
        let bytes = if bytes.len() > capacity {
            &bytes[bytes.len() - capacity..]
        } else {
            bytes
        };

        let first = bytes.len().min(capacity - self.position);
        self.buffer[self.position..self.position + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        self.buffer[..rest].copy_from_slice(&bytes[first..]);

        self.position = (self.position + bytes.len()) & self.mask;
        self.size = (self.size + bytes.len()).min(capacity);
    }

    /// Byte at `distance` back. Caller guarantees `1 <= distance <= len()`.
    #[inline]
    pub fn byte_at(&self, distance: usize) -> u8 {
        debug_assert!(distance >= 1 && distance <= self.size);
        self.buffer[self.position.wrapping_sub(distance) & self.mask]
    }

    /// Copy up to `out.len()` bytes of a back-reference into `out` and into
    /// the history; returns the number copied.
    ///
    /// Overlapping copies (length greater than distance) repeat the pattern.
    pub fn copy_match(&mut self, distance: usize, length: usize, out: &mut [u8]) -> usize {
        debug_assert!(distance >= 1 && distance <= self.size);
        let n = length.min(out.len());
        let mut src = self.position.wrapping_sub(distance) & self.mask;
        for slot in &mut out[..n] {
            let byte = self.buffer[src];
            *slot = byte;
            self.push(byte);
            src = (src + 1) & self.mask;
        }
        n
    }

    /// History in stream order, oldest first.
    pub fn contents(&self) -> Vec<u8> {
        let start = self.position.wrapping_sub(self.size) & self.mask;
        let mut result = Vec::with_capacity(self.size);
        if start + self.size <= self.buffer.len() {
            result.extend_from_slice(&self.buffer[start..start + self.size]);
        } else {
            result.extend_from_slice(&self.buffer[start..]);
            result.extend_from_slice(&self.buffer[..self.position]);
        }
        result
    }
}

/// A preset dictionary, capped to a window size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    bytes: Vec<u8>,
    id: u32,
}

impl Dictionary {
    /// Keep the trailing `window_size` bytes of `bytes`.
    ///
    /// The id is the Adler-32 of the complete input, which is what zlib
    /// headers carry even when the dictionary is longer than the window.
    pub fn new(bytes: &[u8], window_size: usize) -> Self {
        let tail = if bytes.len() > window_size {
            &bytes[bytes.len() - window_size..]
        } else {
            bytes
        };
        Self {
            bytes: tail.to_vec(),
            id: adler32(1, bytes),
        }
    }

    /// Adler-32 dictionary id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Bytes that will be loaded as history.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the usable part.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
