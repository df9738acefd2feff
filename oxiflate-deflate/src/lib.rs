//! # OxiFlate Deflate
//!
//! Streaming DEFLATE (RFC 1951) codec with zlib (RFC 1950) and gzip
//! (RFC 1952) framing.
//!
//! ## Features
//!
//! - **Decoder**: resumable at any input or output split
//!   - Stored, fixed and dynamic Huffman blocks
//!   - Raw, zlib, gzip and auto-detected framing
//!   - Preset dictionaries, flush-marker resynchronization
//! - **Encoder**: LZ77 + Huffman encoding
//!   - Levels 0-9 and five strategies
//!   - Sync/full flushes, mid-stream reconfiguration, dictionaries
//!   - Every block is the smallest of stored, fixed and dynamic
//! - **CallbackDecoder**: pull/push decoding through a single window
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_deflate::{deflate, inflate};
//!
//! // Compress data
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! // Decompress data
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Streaming
//!
//! ```rust
//! use oxiflate_core::{FlushMode, Status, StreamBuffers};
//! use oxiflate_deflate::{Decoder, Encoder};
//!
//! let mut encoder = Encoder::zlib(6).unwrap();
//! let mut compressed = vec![0u8; 64];
//! let mut buffers = StreamBuffers::new(b"streamed", &mut compressed);
//! assert_eq!(encoder.process(&mut buffers, FlushMode::Finish).unwrap(), Status::StreamEnd);
//! let len = buffers.output_produced();
//!
//! let mut decoder = Decoder::zlib();
//! let mut plain = [0u8; 16];
//! let mut buffers = StreamBuffers::new(&compressed[..len], &mut plain);
//! assert_eq!(decoder.process(&mut buffers).unwrap(), Status::StreamEnd);
//! assert_eq!(buffers.produced(), b"streamed");
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-3: Fast compression
//! - Level 4-6: Balanced (default is 6)
//! - Level 7-9: Best compression (slower)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod back;
pub mod block;
pub mod bound;
pub mod config;
pub mod deflate;
pub mod gzip;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;
pub mod zlib;

// Re-exports
pub use back::{CallbackDecoder, Chunks, Pull, Push, ReadPull};
pub use bound::{compress_bound, zlib_bound};
pub use config::{DecoderConfig, EncoderConfig, Strategy, Wrapper};
pub use deflate::{Encoder, deflate};
pub use gzip::GzipHeader;
pub use inflate::{Decoder, inflate};
pub use lz77::MatchParams;
pub use zlib::{
    zlib_compress, zlib_compress_with_dict, zlib_decompress, zlib_decompress_with_dict,
    zlib_requires_dictionary,
};
