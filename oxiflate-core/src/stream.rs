//! Per-stream cursor and bookkeeping shared by encoders and decoders.
//!
//! A codec call borrows a [`StreamBuffers`] for its duration: an input slice
//! to read from and an output slice to write into, each with a cursor. The
//! long-lived counters (totals, checksum, last status) live in a
//! [`CodecState`] owned by the codec itself.

use crate::error::{ErrorCode, FlateError};

/// Outcome of a successful codec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Progress was made; call again with more input or output space.
    #[default]
    Ok,
    /// The end of the stream has been reached and all output delivered.
    StreamEnd,
    /// A preset dictionary is required before decoding can continue.
    NeedDict,
    /// No progress was possible; supply more input or output space.
    BufError,
}

/// Flush mode for compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FlushMode {
    /// No flush - buffer data for best compression.
    #[default]
    None,
    /// Sync flush - emit all pending output, ending on a byte boundary.
    Sync,
    /// Full flush - sync flush and forget the match history.
    Full,
    /// Finish - complete the stream.
    Finish,
}

/// Input/output slices for one codec call.
#[derive(Debug)]
pub struct StreamBuffers<'a> {
    input: &'a [u8],
    input_consumed: usize,
    output: &'a mut [u8],
    output_produced: usize,
}

impl<'a> StreamBuffers<'a> {
    /// Attach slices with both cursors at zero.
    pub fn new(input: &'a [u8], output: &'a mut [u8]) -> Self {
        Self {
            input,
            input_consumed: 0,
            output,
            output_produced: 0,
        }
    }

    /// Bytes consumed from the input.
    pub fn input_consumed(&self) -> usize {
        self.input_consumed
    }

    /// Bytes written to the output.
    pub fn output_produced(&self) -> usize {
        self.output_produced
    }

    /// Unconsumed input.
    pub fn remaining_input(&self) -> &'a [u8] {
        &self.input[self.input_consumed..]
    }

    /// Free output space.
    pub fn available_output(&self) -> usize {
        self.output.len() - self.output_produced
    }

    /// Whole input slice and current input cursor.
    pub fn input_parts(&self) -> (&'a [u8], usize) {
        (self.input, self.input_consumed)
    }

    /// Set the input cursor; must not move past the slice end.
    pub fn set_input_consumed(&mut self, consumed: usize) {
        debug_assert!(consumed <= self.input.len());
        self.input_consumed = consumed.min(self.input.len());
    }

    /// Mark `n` more input bytes as consumed.
    pub fn consume(&mut self, n: usize) {
        self.set_input_consumed(self.input_consumed + n);
    }

    /// Free output space as a mutable slice.
    pub fn output_mut(&mut self) -> &mut [u8] {
        &mut self.output[self.output_produced..]
    }

    /// Mark `n` more output bytes as produced.
    pub fn produce(&mut self, n: usize) {
        debug_assert!(self.output_produced + n <= self.output.len());
        self.output_produced = (self.output_produced + n).min(self.output.len());
    }

    /// Copy as much of `data` as fits; returns the number of bytes copied.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.available_output());
        self.output[self.output_produced..self.output_produced + n].copy_from_slice(&data[..n]);
        self.output_produced += n;
        n
    }

    /// Bytes produced so far in this call.
    pub fn produced(&self) -> &[u8] {
        &self.output[..self.output_produced]
    }

    /// Output bytes written at or after `start`.
    pub fn produced_since(&self, start: usize) -> &[u8] {
        &self.output[start..self.output_produced]
    }
}

/// Long-lived counters for one logical stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecState {
    /// Total input bytes consumed across calls.
    pub total_in: u64,
    /// Total output bytes produced across calls.
    pub total_out: u64,
    /// Running checksum of the uncompressed data (or the requested
    /// dictionary id while a decoder reports `NeedDict`).
    pub checksum: u32,
    /// Flush mode of the most recent call.
    pub flush_mode: FlushMode,
    /// Status of the most recent successful call.
    pub status: Status,
    /// Classification of the last fatal error, if any.
    pub error: Option<ErrorCode>,
    /// Message of the last fatal error, if any.
    pub message: Option<String>,
}

impl CodecState {
    /// Fresh state with the given initial checksum.
    pub fn new(checksum: u32) -> Self {
        Self {
            checksum,
            ..Self::default()
        }
    }

    /// Record the byte counts of a finished call.
    pub fn advance(&mut self, consumed: usize, produced: usize) {
        self.total_in += consumed as u64;
        self.total_out += produced as u64;
    }

    /// Record a fatal error.
    pub fn record_error(&mut self, err: &FlateError) {
        self.error = Some(err.code());
        self.message = Some(err.to_string());
    }

    /// Forget a recorded error.
    pub fn clear_error(&mut self) {
        self.error = None;
        self.message = None;
    }
}
