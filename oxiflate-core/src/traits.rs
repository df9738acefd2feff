//! Slice-oriented codec traits.
//!
//! These are thin adapters over the state-machine APIs of the concrete
//! encoder and decoder, returning `(consumed, produced, status)` triples.

use crate::error::{FlateError, Result};
use crate::stream::{FlushMode, Status};

/// A streaming decompressor (decoder).
pub trait Decompressor {
    /// Decompress data from input to output.
    ///
    /// # Returns
    ///
    /// A tuple of (bytes consumed from input, bytes written to output, status)
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, Status)>;

    /// Reset the decompressor to its initial state.
    fn reset(&mut self);

    /// Check if the decompressor has finished.
    fn is_finished(&self) -> bool;

    /// Decompress a complete stream held in memory.
    fn decompress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) = self.decompress(&input[input_pos..], &mut buffer)?;
            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            match status {
                Status::StreamEnd => break,
                Status::NeedDict => {
                    return Err(FlateError::stream("stream requires a preset dictionary"));
                }
                Status::BufError if input_pos >= input.len() => {
                    return Err(FlateError::data(
                        input_pos as u64,
                        "unexpected end of compressed input",
                    ));
                }
                Status::Ok | Status::BufError => continue,
            }
        }

        Ok(output)
    }
}

/// A streaming compressor (encoder).
pub trait Compressor {
    /// Compress data from input to output.
    ///
    /// # Returns
    ///
    /// A tuple of (bytes consumed from input, bytes written to output, status)
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, Status)>;

    /// Reset the compressor to its initial state.
    fn reset(&mut self);

    /// Check if the compressor has finished.
    fn is_finished(&self) -> bool;

    /// Compress all data at once and finish the stream.
    fn compress_all(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input_pos = 0;
        let mut buffer = vec![0u8; 32768];

        loop {
            let (consumed, produced, status) =
                self.compress(&input[input_pos..], &mut buffer, FlushMode::Finish)?;
            input_pos += consumed;
            output.extend_from_slice(&buffer[..produced]);

            if status == Status::StreamEnd {
                break;
            }
        }

        Ok(output)
    }
}
