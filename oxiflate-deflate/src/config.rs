//! Encoder and decoder configuration.
//!
//! Both configs are plain values with builder-style setters:
//!
//! ```
//! use oxiflate_deflate::{EncoderConfig, Strategy, Wrapper};
//!
//! let config = EncoderConfig::new()
//!     .level(9)
//!     .strategy(Strategy::Filtered)
//!     .wrapper(Wrapper::Gzip);
//! assert!(config.validate().is_ok());
//! ```

use crate::gzip::GzipHeader;
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::window::{MAX_WINDOW_BITS, MIN_WINDOW_BITS};

/// Match-finding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Normal LZ77 + Huffman.
    #[default]
    Default,
    /// Drop short matches; suited to filtered (delta-coded) data.
    Filtered,
    /// Literals only.
    HuffmanOnly,
    /// Distance-one matches only.
    Rle,
    /// Never use dynamic Huffman blocks.
    Fixed,
}

/// Stream framing around the DEFLATE data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Wrapper {
    /// Bare DEFLATE (RFC 1951).
    Raw,
    /// zlib framing (RFC 1950).
    #[default]
    Zlib,
    /// gzip framing (RFC 1952).
    Gzip,
    /// Decoder only: gzip if the magic number is present, zlib otherwise.
    Auto,
}

/// Smallest window the encoder produces; 8 is promoted to this.
pub const MIN_ENCODER_WINDOW_BITS: u8 = 9;

/// Largest `mem_level`.
pub const MAX_MEM_LEVEL: u8 = 9;

/// Default compression level.
pub const DEFAULT_LEVEL: u8 = 6;

/// Default `mem_level`.
pub const DEFAULT_MEM_LEVEL: u8 = 8;

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderConfig {
    /// Compression level (0-9).
    pub level: u8,
    /// Match-finding strategy.
    pub strategy: Strategy,
    /// Base-two log of the window size (8-15).
    pub window_bits: u8,
    /// Memory level (1-9): hash table and block buffer sizes.
    pub mem_level: u8,
    /// Framing.
    pub wrapper: Wrapper,
    /// gzip header to emit; the default header when `None`.
    pub header: Option<GzipHeader>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            strategy: Strategy::Default,
            window_bits: MAX_WINDOW_BITS,
            mem_level: DEFAULT_MEM_LEVEL,
            wrapper: Wrapper::Zlib,
            header: None,
        }
    }
}

impl EncoderConfig {
    /// Default configuration: level 6, zlib, 32 KB window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression level.
    pub fn level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Set the strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the window size exponent.
    pub fn window_bits(mut self, window_bits: u8) -> Self {
        self.window_bits = window_bits;
        self
    }

    /// Set the memory level.
    pub fn mem_level(mut self, mem_level: u8) -> Self {
        self.mem_level = mem_level;
        self
    }

    /// Set the framing.
    pub fn wrapper(mut self, wrapper: Wrapper) -> Self {
        self.wrapper = wrapper;
        self
    }

    /// Set the gzip header.
    pub fn header(mut self, header: GzipHeader) -> Self {
        self.header = Some(header);
        self
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&self.window_bits) {
            return Err(FlateError::version(format!(
                "window_bits {} outside {}..={}",
                self.window_bits, MIN_WINDOW_BITS, MAX_WINDOW_BITS
            )));
        }
        if self.level > 9 {
            return Err(FlateError::stream(format!(
                "level {} outside 0..=9",
                self.level
            )));
        }
        if !(1..=MAX_MEM_LEVEL).contains(&self.mem_level) {
            return Err(FlateError::stream(format!(
                "mem_level {} outside 1..={}",
                self.mem_level, MAX_MEM_LEVEL
            )));
        }
        if self.wrapper == Wrapper::Auto {
            return Err(FlateError::stream("the encoder needs an explicit wrapper"));
        }
        Ok(())
    }

    /// Window exponent actually used (8 is promoted to 9).
    pub fn effective_window_bits(&self) -> u8 {
        self.window_bits.max(MIN_ENCODER_WINDOW_BITS)
    }

    /// Window size in bytes.
    pub fn window_size(&self) -> usize {
        1 << self.effective_window_bits()
    }

    /// Hash table exponent.
    pub fn hash_bits(&self) -> u32 {
        self.mem_level as u32 + 7
    }

    /// Symbols buffered per block.
    pub fn symbol_capacity(&self) -> usize {
        1 << (self.mem_level as u32 + 6)
    }
}

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderConfig {
    /// Base-two log of the largest window accepted (8-15).
    pub window_bits: u8,
    /// Expected framing.
    pub wrapper: Wrapper,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            window_bits: MAX_WINDOW_BITS,
            wrapper: Wrapper::Zlib,
        }
    }
}

impl DecoderConfig {
    /// Default configuration: zlib, 32 KB window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window size exponent.
    pub fn window_bits(mut self, window_bits: u8) -> Self {
        self.window_bits = window_bits;
        self
    }

    /// Set the framing.
    pub fn wrapper(mut self, wrapper: Wrapper) -> Self {
        self.wrapper = wrapper;
        self
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&self.window_bits) {
            return Err(FlateError::version(format!(
                "window_bits {} outside {}..={}",
                self.window_bits, MIN_WINDOW_BITS, MAX_WINDOW_BITS
            )));
        }
        Ok(())
    }
}
