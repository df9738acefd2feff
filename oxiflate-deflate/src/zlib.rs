//! Zlib format one-shot helpers.
//!
//! The zlib format (RFC 1950) wraps raw DEFLATE data with a header and
//! an Adler-32 checksum.
//!
//! # Format
//!
//! ```text
//! +---+---+=========+============+---+---+---+---+
//! |CMF|FLG|[DICTID] | compressed |    ADLER32    |
//! +---+---+=========+============+---+---+---+---+
//! ```
//!
//! - CMF: Compression Method and Flags
//!   - Bits 0-3: CM (Compression Method) - must be 8 for DEFLATE
//!   - Bits 4-7: CINFO (Compression Info) - log2(window size) - 8
//! - FLG: Flags
//!   - Bits 0-4: FCHECK - check bits so (CMF*256 + FLG) mod 31 == 0
//!   - Bit 5: FDICT - preset dictionary present
//!   - Bits 6-7: FLEVEL - compression level (0-3)
//! - DICTID: Adler-32 of the preset dictionary (big-endian), when FDICT is set
//! - ADLER32: Adler-32 checksum of uncompressed data (big-endian)

use crate::deflate::Encoder;
use crate::gzip::CM_DEFLATE;
use crate::inflate::Decoder;
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::stream::Status;
use oxiflate_core::traits::{Compressor, Decompressor};

/// FDICT bit of the FLG byte.
const FDICT: u8 = 0x20;

/// Compress `input` into a zlib stream.
pub fn zlib_compress(input: &[u8], level: u8) -> Result<Vec<u8>> {
    Encoder::zlib(level)?.compress_all(input)
}

/// Compress `input` into a zlib stream primed with `dictionary`.
///
/// The header carries the dictionary's Adler-32 so decoders can ask for it.
pub fn zlib_compress_with_dict(input: &[u8], level: u8, dictionary: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = Encoder::zlib(level)?;
    encoder.set_dictionary(dictionary)?;
    encoder.compress_all(input)
}

/// Decompress a complete zlib stream.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    Decoder::zlib().decompress_all(input)
}

/// Decompress a zlib stream, supplying `dictionary` when the stream asks
/// for one.
pub fn zlib_decompress_with_dict(input: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = Decoder::zlib();
    let mut output = Vec::new();
    let mut buffer = vec![0u8; 32768];
    let mut pos = 0;

    loop {
        let (consumed, produced, status) = decoder.decompress(&input[pos..], &mut buffer)?;
        pos += consumed;
        output.extend_from_slice(&buffer[..produced]);

        match status {
            Status::StreamEnd => return Ok(output),
            Status::NeedDict => decoder.set_dictionary(dictionary)?,
            Status::BufError if pos >= input.len() => {
                return Err(FlateError::data(
                    pos as u64,
                    "unexpected end of compressed input",
                ));
            }
            Status::Ok | Status::BufError => {}
        }
    }
}

/// Check if zlib data requires a preset dictionary.
///
/// Returns `Some(id)`, the Adler-32 of the expected dictionary, when the
/// header is valid and has FDICT set.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::zlib::{zlib_compress_with_dict, zlib_requires_dictionary};
///
/// let dict = b"test dictionary";
/// let compressed = zlib_compress_with_dict(b"test data", 6, dict).unwrap();
/// let required_checksum = zlib_requires_dictionary(&compressed);
/// assert!(required_checksum.is_some());
/// ```
pub fn zlib_requires_dictionary(input: &[u8]) -> Option<u32> {
    if input.len() < 6 {
        return None;
    }
    let (cmf, flg) = (input[0], input[1]);
    if cmf & 0x0F != CM_DEFLATE || (((cmf as u16) << 8) | flg as u16) % 31 != 0 {
        return None;
    }
    if flg & FDICT != 0 {
        Some(u32::from_be_bytes([input[2], input[3], input[4], input[5]]))
    } else {
        None
    }
}
