//! Bit-level I/O over caller-owned byte slices.
//!
//! DEFLATE packs bits LSB-first: the first bit of the stream is bit 0 of the
//! first byte. Both types here keep their state between calls, so a codec can
//! stop when a slice runs out and resume on the next one.
//!
//! - [`BitAccumulator`] pulls bytes from an input slice into a 64-bit hold
//!   register and hands out bits.
//! - [`BitSink`] collects bits into an internal byte queue that is drained
//!   into output slices as space allows.

use crate::error::{FlateError, Result};

// ============================================================================
// Input side
// ============================================================================

/// Resumable LSB-first bit reader fed from byte slices.
///
/// The accumulator never reads past the slice it is given. Bytes pulled into
/// the hold register count as consumed; [`BitAccumulator::give_back`] undoes
/// that for whole bytes that were not needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitAccumulator {
    /// Pending bits, oldest in the low positions.
    hold: u64,
    /// Number of valid bits in `hold`.
    count: u32,
    /// Bits consumed since construction or the last reset.
    consumed: u64,
}

impl BitAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all buffered bits and reset counters.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Number of buffered bits.
    #[inline]
    pub fn available(&self) -> u32 {
        self.count
    }

    /// Total bits consumed so far.
    pub fn bits_consumed(&self) -> u64 {
        self.consumed
    }

    /// Raw hold register.
    #[inline]
    pub fn hold(&self) -> u64 {
        self.hold
    }

    /// Pull bytes from `input[*pos..]` until at least 57 bits are buffered or
    /// the input is exhausted.
    #[inline]
    pub fn fill(&mut self, input: &[u8], pos: &mut usize) {
        while self.count <= 56 && *pos < input.len() {
            self.hold |= (input[*pos] as u64) << self.count;
            self.count += 8;
            *pos += 1;
        }
    }

    /// Try to buffer `n` bits (n <= 57), pulling from `input`.
    #[inline]
    pub fn need(&mut self, n: u32, input: &[u8], pos: &mut usize) -> bool {
        if self.count < n {
            self.fill(input, pos);
        }
        self.count >= n
    }

    /// Peek `n` bits (n <= 32). Caller must have checked availability.
    #[inline]
    pub fn peek(&self, n: u32) -> u32 {
        debug_assert!(n <= 32 && n <= self.count);
        (self.hold & ((1u64 << n) - 1)) as u32
    }

    /// Discard `n` buffered bits.
    #[inline]
    pub fn consume(&mut self, n: u32) {
        debug_assert!(n <= self.count);
        self.hold >>= n;
        self.count -= n;
        self.consumed += n as u64;
    }

    /// Read and discard `n` buffered bits (n <= 32).
    #[inline]
    pub fn take(&mut self, n: u32) -> u32 {
        let value = self.peek(n);
        self.consume(n);
        value
    }

    /// Discard bits up to the next byte boundary.
    pub fn align(&mut self) {
        let extra = self.count % 8;
        self.consume(extra);
    }

    /// Whether the hold is byte-aligned and empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Take one whole byte from the hold, if present. Only meaningful when
    /// aligned.
    pub fn take_byte(&mut self) -> Option<u8> {
        if self.count >= 8 {
            Some(self.take(8) as u8)
        } else {
            None
        }
    }

    /// Return up to `max` trailing whole bytes to the input.
    ///
    /// The most recently pulled bytes sit in the highest positions of the
    /// hold, so these are the ones released. Returns the number of bytes the
    /// caller should step its input position back by.
    pub fn give_back(&mut self, max: usize) -> usize {
        let whole = (self.count / 8) as usize;
        let n = whole.min(max);
        if n > 0 {
            self.count -= 8 * n as u32;
            self.hold &= if self.count == 0 {
                0
            } else {
                (1u64 << self.count) - 1
            };
        }
        n
    }

    /// Inject `bits` bits of `value` after the currently buffered bits.
    pub fn prime(&mut self, bits: u32, value: u32) -> Result<()> {
        if bits > 16 || self.count + bits > 32 {
            return Err(FlateError::stream(format!(
                "cannot prime {} bits with {} already buffered",
                bits, self.count
            )));
        }
        if bits == 0 {
            return Ok(());
        }
        let masked = (value as u64) & ((1u64 << bits) - 1);
        self.hold |= masked << self.count;
        self.count += bits;
        Ok(())
    }
}

// ============================================================================
// Output side
// ============================================================================

/// LSB-first bit writer backed by a growable byte queue.
///
/// Bits accumulate in a 64-bit register and spill into the queue a byte at a
/// time. The queue is drained into caller slices with [`BitSink::drain_into`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSink {
    /// Completed bytes waiting to be delivered.
    queue: Vec<u8>,
    /// Index of the first undelivered byte in `queue`.
    head: usize,
    /// Partial bits, oldest in the low positions.
    bit_buf: u64,
    /// Number of valid bits in `bit_buf`.
    bit_count: u32,
    /// Total bits written.
    written: u64,
}

impl BitSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, including undelivered bytes.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.head = 0;
        self.bit_buf = 0;
        self.bit_count = 0;
        self.written = 0;
    }

    /// Make room for `additional` more queued bytes.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.queue
            .try_reserve(additional)
            .map_err(|_| FlateError::mem(additional))
    }

    /// Write the low `count` bits of `value` (count <= 32).
    #[inline]
    pub fn put_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32);
        if count == 0 {
            return;
        }
        let masked = (value as u64) & ((1u64 << count) - 1);
        self.bit_buf |= masked << self.bit_count;
        self.bit_count += count;
        self.written += count as u64;
        while self.bit_count >= 8 {
            self.queue.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Write a Huffman code given MSB-first, reversing it into stream order.
    #[inline]
    pub fn put_code(&mut self, code: u16, len: u8) {
        self.put_bits(reverse_bits(code, len) as u32, len as u32);
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            self.put_bits(0, pad);
        }
    }

    /// Append whole bytes. The sink must be byte-aligned.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bit_count, 0, "put_bytes requires alignment");
        self.queue.extend_from_slice(bytes);
        self.written += 8 * bytes.len() as u64;
    }

    /// Append bytes ahead of any partial bits still in the register.
    ///
    /// Used for wrapper headers, which precede primed bits in the output.
    pub fn put_header_bytes(&mut self, bytes: &[u8]) {
        self.queue.extend_from_slice(bytes);
    }

    /// Bits in the partial register (0..8).
    #[inline]
    pub fn partial_bits(&self) -> u32 {
        self.bit_count
    }

    /// Completed bytes not yet delivered.
    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.queue.len() - self.head
    }

    /// Total bits written through the bit interface.
    pub fn bits_written(&self) -> u64 {
        self.written
    }

    /// Whether all completed bytes have been delivered.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.head == self.queue.len()
    }

    /// Copy as many pending bytes as fit into `out`; returns the count.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = self.pending_bytes().min(out.len());
        out[..n].copy_from_slice(&self.queue[self.head..self.head + n]);
        self.head += n;
        if self.head == self.queue.len() {
            self.queue.clear();
            self.head = 0;
        }
        n
    }
}

/// Reverse the low `len` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, len: u8) -> u16 {
    if len == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - len as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_read_bits() {
        let data = [0b1010_1010u8, 0b1100_1100];
        let mut acc = BitAccumulator::new();
        let mut pos = 0;

        assert!(acc.need(4, &data, &mut pos));
        assert_eq!(acc.take(4), 0b1010);
        assert_eq!(acc.take(4), 0b1010);
        assert_eq!(acc.take(8), 0b1100_1100);
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_accumulator_resumes_across_slices() {
        let mut acc = BitAccumulator::new();
        let mut pos = 0;
        assert!(!acc.need(12, &[0xCD], &mut pos));
        assert_eq!(pos, 1);

        let mut pos = 0;
        assert!(acc.need(12, &[0xAB], &mut pos));
        assert_eq!(acc.take(12), 0xBCD);
        assert_eq!(acc.available(), 4);
    }

    #[test]
    fn test_accumulator_give_back() {
        let data = [1u8, 2, 3, 4, 5];
        let mut acc = BitAccumulator::new();
        let mut pos = 0;
        acc.fill(&data, &mut pos);
        assert_eq!(pos, 5);
        acc.consume(8);

        let returned = acc.give_back(pos);
        pos -= returned;
        assert_eq!(returned, 4);
        assert_eq!(pos, 1);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_accumulator_align() {
        let mut acc = BitAccumulator::new();
        let mut pos = 0;
        acc.fill(&[0xFF, 0x5A], &mut pos);
        acc.consume(3);
        acc.align();
        assert_eq!(acc.take_byte(), Some(0x5A));
        assert_eq!(acc.take_byte(), None);
    }

    #[test]
    fn test_accumulator_prime() {
        let mut acc = BitAccumulator::new();
        acc.prime(3, 0b101).unwrap();
        let mut pos = 0;
        assert!(acc.need(11, &[0xFF], &mut pos));
        assert_eq!(acc.take(3), 0b101);
        assert_eq!(acc.take(8), 0xFF);
        assert!(acc.prime(17, 0).is_err());
    }

    #[test]
    fn test_sink_write_bits() {
        let mut sink = BitSink::new();
        sink.put_bits(0b1010, 4);
        sink.put_bits(0b1010, 4);
        sink.put_bits(0b1100_1100, 8);

        let mut out = [0u8; 4];
        let n = sink.drain_into(&mut out);
        assert_eq!(&out[..n], &[0b1010_1010, 0b1100_1100]);
    }

    #[test]
    fn test_sink_align_and_bytes() {
        let mut sink = BitSink::new();
        sink.put_bits(0b1, 1);
        sink.align();
        sink.put_bytes(&[0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(sink.pending_bytes(), 5);

        let mut out = [0u8; 2];
        assert_eq!(sink.drain_into(&mut out), 2);
        assert_eq!(out, [0x01, 0x00]);
        assert!(!sink.is_drained());

        let mut rest = [0u8; 8];
        assert_eq!(sink.drain_into(&mut rest), 3);
        assert_eq!(&rest[..3], &[0x00, 0xFF, 0xFF]);
        assert!(sink.is_drained());
    }

    #[test]
    fn test_header_bytes_precede_partial_bits() {
        let mut sink = BitSink::new();
        sink.put_bits(0b11, 2);
        sink.put_header_bytes(&[0x78, 0x9C]);
        sink.put_bits(0, 6);

        let mut out = [0u8; 3];
        assert_eq!(sink.drain_into(&mut out), 3);
        assert_eq!(out, [0x78, 0x9C, 0b11]);
    }

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b101, 3), 0b101);
        assert_eq!(reverse_bits(0b110, 3), 0b011);
        assert_eq!(reverse_bits(0b1, 1), 0b1);
        assert_eq!(reverse_bits(0b1000_0000, 8), 0b0000_0001);
    }
}
