//! GZIP member header (RFC 1952).
//!
//! The encoder serializes a [`GzipHeader`] in one go; the decoder fills one
//! in field by field as header bytes arrive. Names and comments travel as
//! ISO-8859-1 and are converted with `encoding_rs`.

use encoding_rs::WINDOWS_1252;
use oxiflate_core::crc::crc32;

/// GZIP magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// GZIP compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// Operating system code for "unknown".
pub const OS_UNKNOWN: u8 = 255;

/// GZIP header flags.
pub mod flags {
    /// Text file.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits that must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// GZIP file header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GzipHeader {
    /// Data is probably text.
    pub text: bool,
    /// Modification time (Unix timestamp, 0 if unknown).
    pub mtime: u32,
    /// Extra flags.
    pub xfl: u8,
    /// Operating system.
    pub os: u8,
    /// Original filename.
    pub name: Option<String>,
    /// Comment.
    pub comment: Option<String>,
    /// Extra field payload.
    pub extra: Option<Vec<u8>>,
    /// Header carries a CRC-16.
    pub has_crc16: bool,
    /// Set by the decoder once the whole header has been read.
    pub done: bool,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            text: false,
            mtime: 0,
            xfl: 0,
            os: OS_UNKNOWN,
            name: None,
            comment: None,
            extra: None,
            has_crc16: false,
            done: false,
        }
    }
}

impl GzipHeader {
    /// Create a new GZIP header with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the original filename.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the extra field.
    pub fn extra(mut self, extra: impl Into<Vec<u8>>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Set the modification time.
    pub fn mtime(mut self, mtime: u32) -> Self {
        self.mtime = mtime;
        self
    }

    /// Request a header CRC.
    pub fn with_crc16(mut self, enabled: bool) -> Self {
        self.has_crc16 = enabled;
        self
    }

    /// FLG byte for this header.
    pub fn flag_byte(&self) -> u8 {
        let mut flg = 0;
        if self.text {
            flg |= flags::FTEXT;
        }
        if self.has_crc16 {
            flg |= flags::FHCRC;
        }
        if self.extra.is_some() {
            flg |= flags::FEXTRA;
        }
        if self.name.is_some() {
            flg |= flags::FNAME;
        }
        if self.comment.is_some() {
            flg |= flags::FCOMMENT;
        }
        flg
    }

    /// Serialize the header. `xfl` overrides the stored extra flags.
    pub fn to_bytes(&self, xfl: u8) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&GZIP_MAGIC);
        out.push(CM_DEFLATE);
        out.push(self.flag_byte());
        out.extend_from_slice(&self.mtime.to_le_bytes());
        out.push(xfl);
        out.push(self.os);

        if let Some(extra) = &self.extra {
            let len = extra.len().min(u16::MAX as usize);
            out.extend_from_slice(&(len as u16).to_le_bytes());
            out.extend_from_slice(&extra[..len]);
        }
        if let Some(name) = &self.name {
            out.extend_from_slice(&encode_latin1(name));
            out.push(0);
        }
        if let Some(comment) = &self.comment {
            out.extend_from_slice(&encode_latin1(comment));
            out.push(0);
        }
        if self.has_crc16 {
            let crc = crc32(0, &out) as u16;
            out.extend_from_slice(&crc.to_le_bytes());
        }
        out
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        let mut len = 10;
        if let Some(extra) = &self.extra {
            len += 2 + extra.len().min(u16::MAX as usize);
        }
        if let Some(name) = &self.name {
            len += encode_latin1(name).len() + 1;
        }
        if let Some(comment) = &self.comment {
            len += encode_latin1(comment).len() + 1;
        }
        if self.has_crc16 {
            len += 2;
        }
        len
    }
}

/// Encode a string as ISO-8859-1, stopping at any NUL.
pub fn encode_latin1(s: &str) -> Vec<u8> {
    let s = s.split('\0').next().unwrap_or_default();
    let (bytes, _, _) = WINDOWS_1252.encode(s);
    bytes.into_owned()
}

/// Decode ISO-8859-1 bytes.
pub fn decode_latin1(bytes: &[u8]) -> String {
    WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

/// XFL byte zlib writes for a level and strategy.
pub fn xfl_for(level: u8, huffman_only_or_rle: bool) -> u8 {
    if level == 9 {
        2
    } else if huffman_only_or_rle || level < 2 {
        4
    } else {
        0
    }
}
