//! # OxiFlate Core
//!
//! Core components for the OxiFlate streaming codec engine.
//!
//! - [`checksum`]: CRC-32 / Adler-32 with associative `combine`
//! - [`bitstream`]: resumable bit I/O over caller-owned slices
//! - [`window`]: sliding history window and preset dictionaries
//! - [`stream`]: per-call buffers, stream counters, status and flush modes
//! - [`traits`]: slice-oriented compressor/decompressor traits
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container                                           │
//! │     gzip file handle (oxiflate-gzip)                    │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     Encoder / Decoder / CallbackDecoder (oxiflate-deflate)│
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Stream primitives (this crate)                      │
//! │     BitAccumulator/BitSink, Window, checksums, state    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::checksum::{ChecksumKind, Checksum};
//!
//! let mut crc = Checksum::new(ChecksumKind::Crc32);
//! crc.update(b"Hello, World!");
//! assert_eq!(crc.value(), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod adler;
pub mod bitstream;
pub mod checksum;
pub mod crc;
pub mod error;
#[cfg(feature = "logging")]
pub mod logging;
pub mod stream;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use adler::Adler32;
pub use bitstream::{BitAccumulator, BitSink};
pub use checksum::{Checksum, ChecksumKind};
pub use crc::Crc32;
pub use error::{ErrorCode, FlateError, Result};
pub use stream::{CodecState, FlushMode, Status, StreamBuffers};
pub use traits::{Compressor, Decompressor};
pub use window::{Dictionary, MAX_WINDOW_BITS, MIN_WINDOW_BITS, Window};

/// Compile-time capabilities of this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Smallest accepted `window_bits`.
    pub min_window_bits: u8,
    /// Largest accepted `window_bits`.
    pub max_window_bits: u8,
    /// Largest accepted `mem_level`.
    pub max_mem_level: u8,
    /// Whether chunked checksums run on the rayon pool.
    pub parallel_checksums: bool,
}

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Query what this build supports.
pub fn capabilities() -> Capabilities {
    Capabilities {
        min_window_bits: MIN_WINDOW_BITS,
        max_window_bits: MAX_WINDOW_BITS,
        max_mem_level: 9,
        parallel_checksums: cfg!(feature = "parallel"),
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::checksum::{Checksum, ChecksumKind};
    pub use crate::error::{FlateError, Result};
    pub use crate::stream::{CodecState, FlushMode, Status, StreamBuffers};
    pub use crate::traits::{Compressor, Decompressor};
}
