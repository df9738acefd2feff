//! Open-mode strings in the `gzopen` tradition.
//!
//! A mode is one of `r`, `w` or `a`, optionally followed by a level digit,
//! a strategy letter (`f` filtered, `h` huffman-only, `R` rle, `F` fixed)
//! and `T` for uncompressed ("transparent") writes. `b` is accepted and
//! ignored, as are unknown letters.

use oxiflate_core::error::{FlateError, Result};
use oxiflate_deflate::Strategy;
use std::fmt;
use std::str::FromStr;

/// Direction a file is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Decode from the stream.
    Read,
    /// Truncate and encode.
    Write,
    /// Encode a new member after the existing content.
    Append,
}

/// Parsed open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GzMode {
    /// Read, write or append.
    pub access: Access,
    /// Compression level for writes.
    pub level: u8,
    /// Match strategy for writes.
    pub strategy: Strategy,
    /// Write bytes as-is, without gzip framing.
    pub transparent: bool,
}

impl GzMode {
    /// Plain read mode.
    pub fn read() -> Self {
        Self::with_access(Access::Read)
    }

    /// Write mode at the default level.
    pub fn write() -> Self {
        Self::with_access(Access::Write)
    }

    /// Append mode at the default level.
    pub fn append() -> Self {
        Self::with_access(Access::Append)
    }

    fn with_access(access: Access) -> Self {
        Self {
            access,
            level: 6,
            strategy: Strategy::Default,
            transparent: false,
        }
    }

    /// Set the compression level (0-9).
    pub fn level(mut self, level: u8) -> Self {
        self.level = level.min(9);
        self
    }

    /// Set the match strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Whether this mode writes.
    pub fn is_write(&self) -> bool {
        self.access != Access::Read
    }
}

impl FromStr for GzMode {
    type Err = FlateError;

    fn from_str(s: &str) -> Result<Self> {
        let mut access = None;
        let mut mode = GzMode::read();

        for c in s.chars() {
            match c {
                'r' => access = Some(Access::Read),
                'w' => access = Some(Access::Write),
                'a' => access = Some(Access::Append),
                '0'..='9' => mode.level = c as u8 - b'0',
                'f' => mode.strategy = Strategy::Filtered,
                'h' => mode.strategy = Strategy::HuffmanOnly,
                'R' => mode.strategy = Strategy::Rle,
                'F' => mode.strategy = Strategy::Fixed,
                'T' => mode.transparent = true,
                '+' => {
                    return Err(FlateError::stream(
                        "cannot open a gzip file for reading and writing",
                    ));
                }
                _ => {}
            }
        }

        mode.access = access.ok_or_else(|| {
            FlateError::stream(format!("mode {:?} has no r, w or a", s))
        })?;
        // Reads detect the format themselves.
        if mode.access == Access::Read {
            mode.transparent = false;
        }
        Ok(mode)
    }
}

impl fmt::Display for GzMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = match self.access {
            Access::Read => return f.write_str("r"),
            Access::Write => 'w',
            Access::Append => 'a',
        };
        write!(f, "{}{}", access, self.level)?;
        match self.strategy {
            Strategy::Default => {}
            Strategy::Filtered => f.write_str("f")?,
            Strategy::HuffmanOnly => f.write_str("h")?,
            Strategy::Rle => f.write_str("R")?,
            Strategy::Fixed => f.write_str("F")?,
        }
        if self.transparent {
            f.write_str("T")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiflate_core::error::ErrorCode;

    #[test]
    fn test_parse_basic() {
        assert_eq!("r".parse::<GzMode>().unwrap(), GzMode::read());
        assert_eq!("rb".parse::<GzMode>().unwrap(), GzMode::read());
        assert_eq!("wb".parse::<GzMode>().unwrap(), GzMode::write());
        assert_eq!("a".parse::<GzMode>().unwrap(), GzMode::append());
    }

    #[test]
    fn test_parse_options() {
        let mode: GzMode = "wb9h".parse().unwrap();
        assert_eq!(mode.level, 9);
        assert_eq!(mode.strategy, Strategy::HuffmanOnly);
        assert!(!mode.transparent);

        let mode: GzMode = "w1R".parse().unwrap();
        assert_eq!((mode.level, mode.strategy), (1, Strategy::Rle));

        let mode: GzMode = "wT".parse().unwrap();
        assert!(mode.transparent);

        // Transparent is meaningless for reads.
        let mode: GzMode = "rT".parse().unwrap();
        assert!(!mode.transparent);
    }

    #[test]
    fn test_parse_errors() {
        let err = "9f".parse::<GzMode>().unwrap_err();
        assert_eq!(err.code(), ErrorCode::StreamError);
        assert!("r+".parse::<GzMode>().is_err());
        assert!("".parse::<GzMode>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["r", "w6", "a9F", "w0T", "w3f"] {
            let mode: GzMode = text.parse().unwrap();
            assert_eq!(mode.to_string(), text);
        }
    }
}
