//! Callback-driven raw DEFLATE decoding.
//!
//! [`CallbackDecoder`] pulls compressed input from a [`Pull`] source and
//! pushes decoded data to a [`Push`] sink one window at a time, so memory
//! use stays at a single window however large the payload is.
//!
//! ```
//! use oxiflate_deflate::back::{CallbackDecoder, Chunks};
//! use oxiflate_deflate::deflate;
//!
//! let compressed = deflate(b"pushed through a window", 6).unwrap();
//! let mut decoder = CallbackDecoder::new(15, None).unwrap();
//! let mut out = Vec::new();
//! decoder
//!     .run(&mut Chunks::new(&compressed, 4), &mut |data: &[u8]| -> oxiflate_core::Result<()> {
//!         out.extend_from_slice(data);
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(out, b"pushed through a window");
//! ```

use crate::config::{DecoderConfig, Wrapper};
use crate::inflate::Decoder;
use crate::lz77::try_alloc;
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::stream::{Status, StreamBuffers};
use std::io::{self, Read};
use tracing::trace;

/// Source of compressed input.
pub trait Pull {
    /// Next chunk of input; an empty slice means end of input.
    fn pull(&mut self) -> Result<&[u8]>;
}

/// Sink for decoded output. Returning an error aborts decoding.
pub trait Push {
    /// Accept a block of decoded bytes.
    fn push(&mut self, data: &[u8]) -> Result<()>;
}

impl<F> Push for F
where
    F: FnMut(&[u8]) -> Result<()>,
{
    fn push(&mut self, data: &[u8]) -> Result<()> {
        self(data)
    }
}

/// Pulls from a reader through a fixed buffer.
#[derive(Debug)]
pub struct ReadPull<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: Read> ReadPull<R> {
    /// Wrap `reader` with a 16 KB buffer.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, 16 * 1024)
    }

    /// Wrap `reader` with a buffer of `capacity` bytes (at least one).
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buffer: vec![0; capacity.max(1)],
        }
    }

    /// Recover the reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Pull for ReadPull<R> {
    fn pull(&mut self) -> Result<&[u8]> {
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => return Ok(&self.buffer[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Pulls fixed-size chunks from an in-memory slice.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    size: usize,
}

impl<'a> Chunks<'a> {
    /// Serve `data` in chunks of `size` bytes (at least one).
    pub fn new(data: &'a [u8], size: usize) -> Self {
        Self {
            data,
            size: size.max(1),
        }
    }
}

impl Pull for Chunks<'_> {
    fn pull(&mut self) -> Result<&[u8]> {
        let n = self.size.min(self.data.len());
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }
}

/// Raw DEFLATE decoder driven by pull/push callbacks.
#[derive(Debug)]
pub struct CallbackDecoder {
    decoder: Decoder,
    window: Vec<u8>,
    filled: usize,
    unused: usize,
}

impl CallbackDecoder {
    /// Decoder with a `1 << window_bits` output window and an optional
    /// preset dictionary.
    pub fn new(window_bits: u8, dictionary: Option<&[u8]>) -> Result<Self> {
        let config = DecoderConfig::new()
            .window_bits(window_bits)
            .wrapper(Wrapper::Raw);
        let mut decoder = Decoder::new(config)?;
        if let Some(dict) = dictionary {
            decoder.set_dictionary(dict)?;
        }
        Ok(Self {
            decoder,
            window: try_alloc(1usize << window_bits, 0u8)?,
            filled: 0,
            unused: 0,
        })
    }

    /// Decode the whole stream.
    ///
    /// Every full window is pushed as soon as it fills, followed by the final
    /// partial window. Input ending before the end of the stream is a data
    /// error.
    pub fn run<P, S>(&mut self, pull: &mut P, push: &mut S) -> Result<Status>
    where
        P: Pull + ?Sized,
        S: Push + ?Sized,
    {
        if self.decoder.is_finished() {
            return Ok(Status::StreamEnd);
        }
        loop {
            let input = pull.pull()?;
            if input.is_empty() {
                return Err(FlateError::data(
                    self.decoder.total_in(),
                    "unexpected end of compressed input",
                ));
            }
            trace!(len = input.len(), "pulled input");

            let mut pos = 0;
            loop {
                let mut buffers = StreamBuffers::new(&input[pos..], &mut self.window[self.filled..]);
                let status = self.decoder.process(&mut buffers)?;
                pos += buffers.input_consumed();
                self.filled += buffers.output_produced();

                if self.filled == self.window.len() {
                    push.push(&self.window)?;
                    self.filled = 0;
                }

                match status {
                    Status::StreamEnd => {
                        if self.filled > 0 {
                            push.push(&self.window[..self.filled])?;
                            self.filled = 0;
                        }
                        self.unused = input.len() - pos;
                        return Ok(Status::StreamEnd);
                    }
                    Status::NeedDict => {
                        return Err(FlateError::stream("stream requires a preset dictionary"));
                    }
                    Status::Ok => continue,
                    Status::BufError => break,
                }
            }
        }
    }

    /// Bytes of the last pulled chunk that follow the end of the stream.
    pub fn unused_input(&self) -> usize {
        self.unused
    }

    /// Compressed bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.decoder.total_in()
    }

    /// Bytes decoded.
    pub fn total_out(&self) -> u64 {
        self.decoder.total_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderConfig;
    use crate::deflate::{Encoder, deflate};
    use oxiflate_core::error::ErrorCode;
    use oxiflate_core::traits::Compressor;

    fn collect(decoder: &mut CallbackDecoder, data: &[u8], chunk: usize) -> Result<(Vec<u8>, Vec<usize>)> {
        let mut out = Vec::new();
        let mut sizes = Vec::new();
        decoder.run(&mut Chunks::new(data, chunk), &mut |block: &[u8]| -> Result<()> {
            sizes.push(block.len());
            out.extend_from_slice(block);
            Ok(())
        })?;
        Ok((out, sizes))
    }

    #[test]
    fn test_pushes_whole_windows() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 256) as u8).collect();
        let config = EncoderConfig::new().wrapper(Wrapper::Raw).window_bits(10);
        let compressed = Encoder::new(config).unwrap().compress_all(&data).unwrap();
        let mut decoder = CallbackDecoder::new(10, None).unwrap();
        let (out, sizes) = collect(&mut decoder, &compressed, 100).unwrap();
        assert_eq!(out, data);
        assert_eq!(sizes, vec![1024, 1024, 1024, 1024, 904]);
        assert_eq!(decoder.total_out(), 5000);
    }

    #[test]
    fn test_truncated_input() {
        let compressed = deflate(b"some data that will be cut short", 6).unwrap();
        let mut decoder = CallbackDecoder::new(15, None).unwrap();
        let err = collect(&mut decoder, &compressed[..compressed.len() - 2], 3).unwrap_err();
        assert!(err.to_string().contains("unexpected end"));
    }

    #[test]
    fn test_push_error_aborts() {
        let data = vec![b'z'; 4096];
        let compressed = deflate(&data, 1).unwrap();
        let mut decoder = CallbackDecoder::new(9, None).unwrap();
        let mut calls = 0;
        let err = decoder
            .run(&mut Chunks::new(&compressed, 64), &mut |_: &[u8]| -> Result<()> {
                calls += 1;
                Err(FlateError::stream("stop"))
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StreamError);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_unused_input_after_end() {
        let mut compressed = deflate(b"tail", 6).unwrap();
        compressed.extend_from_slice(b"XYZ");
        let mut decoder = CallbackDecoder::new(15, None).unwrap();
        let (out, _) = collect(&mut decoder, &compressed, compressed.len()).unwrap();
        assert_eq!(out, b"tail");
        assert_eq!(decoder.unused_input(), 3);
    }

    #[test]
    fn test_read_pull_source() {
        let compressed = deflate(b"from a reader", 9).unwrap();
        let mut source = ReadPull::with_capacity(&compressed[..], 5);
        let mut decoder = CallbackDecoder::new(15, None).unwrap();
        let mut out = Vec::new();
        decoder
            .run(&mut source, &mut |block: &[u8]| -> Result<()> {
                out.extend_from_slice(block);
                Ok(())
            })
            .unwrap();
        assert_eq!(out, b"from a reader");
    }
}
