//! # OxiFlate Gzip
//!
//! gzip (RFC 1952) files and byte buffers on top of the streaming codec in
//! `oxiflate-deflate`.
//!
//! - [`GzFile`]: buffered handle over any `Read + Write + Seek`, opened with
//!   `gzopen`-style mode strings
//! - [`compress`] / [`decompress`]: one-shot helpers; decompression accepts
//!   concatenated members
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_gzip::{compress, decompress};
//!
//! let mut data = compress(b"first ", 6).unwrap();
//! data.extend(compress(b"second", 9).unwrap());
//! assert_eq!(decompress(&data).unwrap(), b"first second");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod mode;

pub use file::{DEFAULT_BUFFER_SIZE, GzFile};
pub use mode::{Access, GzMode};

use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::stream::{Status, StreamBuffers};
use oxiflate_core::traits::Compressor;
use oxiflate_deflate::gzip::GZIP_MAGIC;
use oxiflate_deflate::{Decoder, Encoder, EncoderConfig, GzipHeader, Wrapper};
use tracing::debug;

/// Compress `data` into a single gzip member.
pub fn compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    Encoder::gzip(level)?.compress_all(data)
}

/// Compress `data` into a gzip member carrying `header`.
pub fn compress_with_header(data: &[u8], header: GzipHeader, level: u8) -> Result<Vec<u8>> {
    let config = EncoderConfig::new()
        .wrapper(Wrapper::Gzip)
        .level(level)
        .header(header);
    Encoder::new(config)?.compress_all(data)
}

/// Decompress one or more concatenated gzip members.
///
/// Bytes after the last member that do not start another member are
/// ignored.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = Decoder::gzip();
    let mut output = Vec::new();
    let mut buffer = vec![0u8; 32768];
    let mut pos = 0;
    let mut members = 0u32;

    loop {
        let mut buffers = StreamBuffers::new(&data[pos..], &mut buffer);
        let status = decoder.process(&mut buffers)?;
        pos += buffers.input_consumed();
        let produced = buffers.output_produced();
        output.extend_from_slice(&buffer[..produced]);

        match status {
            Status::StreamEnd => {
                members += 1;
                if !data[pos..].starts_with(&GZIP_MAGIC) {
                    if pos < data.len() {
                        debug!(ignored = data.len() - pos, "trailing bytes after gzip data");
                    }
                    debug!(members, "gzip data decoded");
                    return Ok(output);
                }
                decoder.reset_keep_position();
            }
            Status::NeedDict => {
                return Err(FlateError::data(pos as u64, "unexpected dictionary request"));
            }
            Status::BufError if pos >= data.len() => {
                return Err(FlateError::data(pos as u64, "unexpected end of file"));
            }
            Status::Ok | Status::BufError => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiflate_core::checksum::{ChecksumKind, update};

    #[test]
    fn test_gzip_roundtrip() {
        let original = b"Hello, GZIP World! This is a test of compression.";
        let compressed = compress(original, 6).unwrap();
        assert_eq!(&compressed[..2], &GZIP_MAGIC);
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_gzip_empty() {
        let compressed = compress(b"", 6).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), b"");
    }

    #[test]
    fn test_gzip_repeated() {
        let original = vec![b'A'; 10000];
        let compressed = compress(&original, 9).unwrap();
        assert!(compressed.len() < original.len() / 10);
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_multi_member() {
        let parts: [&[u8]; 3] = [b"alpha ", b"", b"omega"];
        let data: Vec<u8> = parts
            .iter()
            .flat_map(|part| compress(part, 6).unwrap())
            .collect();
        assert_eq!(decompress(&data).unwrap(), b"alpha omega");
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = compress(b"body", 6).unwrap();
        data.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(decompress(&data).unwrap(), b"body");
    }

    #[test]
    fn test_header_roundtrip() {
        let header = GzipHeader::new().name("data.txt").mtime(42);
        let compressed = compress_with_header(b"named", header, 6).unwrap();

        let mut decoder = Decoder::gzip();
        let mut out = [0u8; 16];
        let mut buffers = StreamBuffers::new(&compressed, &mut out);
        assert_eq!(decoder.process(&mut buffers).unwrap(), Status::StreamEnd);
        let seen = decoder.header().unwrap();
        assert_eq!(seen.name.as_deref(), Some("data.txt"));
        assert_eq!(seen.mtime, 42);
        assert_eq!(decoder.checksum(), update(ChecksumKind::Crc32, 0, b"named"));
    }

    #[test]
    fn test_truncated() {
        let compressed = compress(b"truncated member", 6).unwrap();
        let err = decompress(&compressed[..compressed.len() - 1]).unwrap_err();
        assert!(err.is_data_error());
    }
}
