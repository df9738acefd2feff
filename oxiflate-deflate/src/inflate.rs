//! Streaming DEFLATE decompression (inflate).
//!
//! [`Decoder`] is a resumable state machine: every call decodes as much as
//! the given input and output slices allow and records where it stopped in
//! its mode. Input may be split at any byte and output may be drained a
//! byte at a time.
//!
//! It supports all three block types:
//! - Type 0: Stored (uncompressed)
//! - Type 1: Fixed Huffman codes
//! - Type 2: Dynamic Huffman codes
//!
//! and the raw, zlib and gzip framings, including preset dictionaries and
//! resynchronization at flush markers.

use crate::config::{DecoderConfig, Wrapper};
use crate::gzip::{CM_DEFLATE, GZIP_MAGIC, GzipHeader, decode_latin1, flags};
use crate::huffman::{END_OF_BLOCK, HuffmanTable, Lookup};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_BASE, DISTANCE_EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA_BITS,
    fixed_distance_table, fixed_litlen_table,
};
use oxiflate_core::bitstream::BitAccumulator;
use oxiflate_core::checksum::{self, ChecksumKind};
use oxiflate_core::crc::crc32;
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::stream::{CodecState, Status, StreamBuffers};
use oxiflate_core::traits::Decompressor;
use oxiflate_core::window::{Dictionary, Window};
use tracing::{debug, trace, warn};

/// Where the decoder is in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Wrapper header (or format detection).
    Header,
    GzipTime,
    GzipOs,
    GzipExtraLen,
    GzipExtra { remaining: usize },
    GzipName,
    GzipComment,
    GzipHeaderCrc,
    /// zlib dictionary id.
    DictId,
    /// Waiting for `set_dictionary`.
    NeedDict,
    BlockHeader,
    StoredLen,
    Stored { remaining: usize },
    TableSizes,
    CodeLengthLens { index: usize },
    CodeLens { index: usize },
    Codes,
    /// A back-reference that did not fit in the output.
    Copy { length: usize, distance: usize },
    /// Wrapper trailer.
    Check,
    Done,
}

/// Why a `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// All input was used and more is needed.
    Starved,
    /// The output slice is full.
    OutputFull,
    NeedDict,
    End,
}

/// Exit reasons of the literal/length decoding loop.
enum CodesExit {
    EndOfBlock,
    OutputFull,
    Starved,
    Pending { length: usize, distance: usize },
}

fn corrupt(bits: &BitAccumulator, message: &str) -> FlateError {
    FlateError::data(bits.bits_consumed() / 8, message)
}

#[inline]
fn low_bits(value: u64, n: u32) -> usize {
    (value & ((1u64 << n) - 1)) as usize
}

/// Decode literals and matches until the block ends or a buffer runs out.
fn decode_codes(
    bits: &mut BitAccumulator,
    window: &mut Window,
    litlen: &HuffmanTable,
    dist: &HuffmanTable,
    input: &[u8],
    pos: &mut usize,
    buffers: &mut StreamBuffers<'_>,
) -> Result<CodesExit> {
    loop {
        if buffers.available_output() == 0 {
            return Ok(CodesExit::OutputFull);
        }
        bits.fill(input, pos);
        let hold = bits.hold();
        let avail = bits.available();

        let (symbol, code_len) = match litlen.lookup(hold, avail) {
            Lookup::Symbol { symbol, length } => (symbol, length as u32),
            Lookup::NeedMore => return Ok(CodesExit::Starved),
            Lookup::Invalid => return Err(corrupt(bits, "invalid literal/length code")),
        };

        if symbol < 256 {
            bits.consume(code_len);
            let byte = symbol as u8;
            buffers.write(&[byte]);
            window.push(byte);
            continue;
        }
        if symbol == END_OF_BLOCK {
            bits.consume(code_len);
            return Ok(CodesExit::EndOfBlock);
        }

        let index = symbol as usize - 257;
        if index >= LENGTH_BASE.len() {
            return Err(corrupt(bits, "invalid literal/length code"));
        }
        let len_extra = LENGTH_EXTRA_BITS[index] as u32;
        let mut used = code_len + len_extra;
        if avail < used {
            return Ok(CodesExit::Starved);
        }
        let length = LENGTH_BASE[index] as usize + low_bits(hold >> code_len, len_extra);

        let (dist_symbol, dist_len) = match dist.lookup(hold >> used, avail - used) {
            Lookup::Symbol { symbol, length } => (symbol as usize, length as u32),
            Lookup::NeedMore => return Ok(CodesExit::Starved),
            Lookup::Invalid => return Err(corrupt(bits, "invalid distance code")),
        };
        if dist_symbol >= DISTANCE_BASE.len() {
            return Err(corrupt(bits, "invalid distance code"));
        }
        let dist_extra = DISTANCE_EXTRA_BITS[dist_symbol] as u32;
        if avail < used + dist_len + dist_extra {
            return Ok(CodesExit::Starved);
        }
        let distance =
            DISTANCE_BASE[dist_symbol] as usize + low_bits(hold >> (used + dist_len), dist_extra);
        used += dist_len + dist_extra;

        if distance > window.len() {
            return Err(corrupt(bits, "invalid distance too far back"));
        }
        bits.consume(used);

        let copied = window.copy_match(distance, length, buffers.output_mut());
        buffers.produce(copied);
        if copied < length {
            return Ok(CodesExit::Pending {
                length: length - copied,
                distance,
            });
        }
    }
}

/// Advance a `00 00 FF FF` match over `buf`; returns the bytes examined.
fn sync_search(have: &mut u8, buf: &[u8]) -> usize {
    let mut next = 0;
    while next < buf.len() && *have < 4 {
        let want = if *have < 2 { 0x00 } else { 0xFF };
        if buf[next] == want {
            *have += 1;
        } else if buf[next] != 0 {
            *have = 0;
        } else {
            *have = 4 - *have;
        }
        next += 1;
    }
    next
}

/// Streaming DEFLATE/zlib/gzip decoder.
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
    /// Framing of the current member (`Auto` until detected).
    wrapper: Wrapper,
    mode: Mode,
    bits: BitAccumulator,
    window: Window,
    state: CodecState,
    check_kind: Option<ChecksumKind>,
    /// Checksum of the current member's output.
    member_check: u32,
    member_len: u64,
    /// Logical checksum of earlier members.
    prefix: Option<u32>,
    /// Trailer validation for the current member.
    validate: bool,
    /// Caller's `validate` choice, restored on reset.
    validate_default: bool,
    last_block: bool,
    /// The most recent block was an empty stored block.
    empty_stored: bool,
    header: Option<GzipHeader>,
    gz_flags: u8,
    head_crc: u32,
    field: Vec<u8>,
    dict_id: u32,
    /// Code lengths being read for a dynamic block.
    lens: [u8; 320],
    hlit: usize,
    hdist: usize,
    hclen: usize,
    codelen: Option<HuffmanTable>,
    /// Tables of the current dynamic block; `None` for fixed blocks.
    dynamic: Option<(HuffmanTable, HuffmanTable)>,
    error: Option<FlateError>,
    syncing: bool,
    sync_have: u8,
}

impl Decoder {
    /// Create a decoder.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Decoder for bare DEFLATE data with a 32 KB window.
    pub fn raw() -> Self {
        Self::build(DecoderConfig::new().wrapper(Wrapper::Raw))
    }

    /// Decoder for zlib streams with a 32 KB window.
    pub fn zlib() -> Self {
        Self::build(DecoderConfig::new().wrapper(Wrapper::Zlib))
    }

    /// Decoder for gzip members with a 32 KB window.
    pub fn gzip() -> Self {
        Self::build(DecoderConfig::new().wrapper(Wrapper::Gzip))
    }

    fn build(config: DecoderConfig) -> Self {
        let mut decoder = Self {
            config,
            wrapper: config.wrapper,
            mode: Mode::Header,
            bits: BitAccumulator::new(),
            window: Window::new(config.window_bits),
            state: CodecState::default(),
            check_kind: None,
            member_check: 0,
            member_len: 0,
            prefix: None,
            validate: true,
            validate_default: true,
            last_block: false,
            empty_stored: false,
            header: None,
            gz_flags: 0,
            head_crc: 0,
            field: Vec::new(),
            dict_id: 0,
            lens: [0; 320],
            hlit: 0,
            hdist: 0,
            hclen: 0,
            codelen: None,
            dynamic: None,
            error: None,
            syncing: false,
            sync_have: 0,
        };
        decoder.reset();
        decoder
    }

    /// Return to the start of a new stream with the same configuration.
    pub fn reset(&mut self) {
        self.wrapper = self.config.wrapper;
        self.mode = if self.wrapper == Wrapper::Raw {
            Mode::BlockHeader
        } else {
            Mode::Header
        };
        self.bits.clear();
        self.window.clear();
        self.check_kind = match self.wrapper {
            Wrapper::Raw => None,
            Wrapper::Gzip => Some(ChecksumKind::Crc32),
            Wrapper::Zlib | Wrapper::Auto => Some(ChecksumKind::Adler32),
        };
        self.member_check = self.check_kind.map_or(0, checksum::identity);
        self.member_len = 0;
        self.prefix = None;
        self.state = CodecState::new(self.member_check);
        self.validate = self.validate_default;
        self.last_block = false;
        self.empty_stored = false;
        self.header = None;
        self.gz_flags = 0;
        self.head_crc = 0;
        self.field.clear();
        self.dict_id = 0;
        self.codelen = None;
        self.dynamic = None;
        self.error = None;
        self.syncing = false;
        self.sync_have = 0;
    }

    /// Start a new member, keeping totals and folding the checksum of
    /// everything decoded so far into the running value.
    pub fn reset_keep_position(&mut self) {
        let (total_in, total_out) = (self.state.total_in, self.state.total_out);
        let logical = self.check_kind.map(|_| self.state.checksum);
        self.reset();
        self.state.total_in = total_in;
        self.state.total_out = total_out;
        self.prefix = logical;
        if let Some(value) = logical {
            self.state.checksum = value;
        }
        debug!(total_in, total_out, "decoder reset for next member");
    }

    /// Enable or disable trailer validation.
    ///
    /// When disabled, no checksum is computed, trailers are not compared and
    /// a stream that ends right after its final block is accepted. The
    /// setting survives `reset` and `reset_keep_position`.
    pub fn validate(&mut self, enable: bool) {
        self.validate = enable;
        self.validate_default = enable;
    }

    /// Independent copy of the whole stream state.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Stream counters and last status.
    pub fn state(&self) -> &CodecState {
        &self.state
    }

    /// Total compressed bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.state.total_in
    }

    /// Total bytes produced.
    pub fn total_out(&self) -> u64 {
        self.state.total_out
    }

    /// Running checksum, or the requested dictionary id after `NeedDict`.
    pub fn checksum(&self) -> u32 {
        self.state.checksum
    }

    /// Whether the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.mode == Mode::Done
    }

    /// Parsed gzip header, as far as it has been read.
    pub fn header(&self) -> Option<&GzipHeader> {
        self.header.as_ref()
    }

    /// Framing of the current stream (`Auto` until detected).
    pub fn wrapper(&self) -> Wrapper {
        self.wrapper
    }

    /// Decoding-table entries built for the current dynamic block.
    pub fn codes_used(&self) -> u64 {
        self.dynamic
            .as_ref()
            .map_or(0, |(litlen, dist)| (litlen.entries() + dist.entries()) as u64)
    }

    /// Whether the decoder sits right after a flush marker, byte-aligned,
    /// waiting for a block header.
    pub fn sync_point(&self) -> bool {
        self.mode == Mode::BlockHeader
            && self.empty_stored
            && !self.last_block
            && self.bits.is_empty()
    }

    /// Current history window, oldest byte first.
    pub fn dictionary(&self) -> Vec<u8> {
        self.window.contents()
    }

    /// Insert bits ahead of the next input byte.
    pub fn prime(&mut self, bits: u32, value: u32) -> Result<()> {
        self.bits.prime(bits, value)
    }

    /// Supply a preset dictionary.
    ///
    /// Valid after `NeedDict`, where the id must match the stream, or before
    /// any input for raw streams.
    pub fn set_dictionary(&mut self, bytes: &[u8]) -> Result<()> {
        let dict = Dictionary::new(bytes, self.window.capacity());
        match self.mode {
            Mode::NeedDict => {
                if dict.id() != self.dict_id {
                    return Err(corrupt(&self.bits, "incorrect dictionary id"));
                }
                self.window.extend(dict.as_bytes());
                self.state.checksum = self.logical_checksum();
                self.mode = Mode::BlockHeader;
                debug!(id = dict.id(), len = dict.len(), "dictionary accepted");
                Ok(())
            }
            Mode::BlockHeader
                if self.wrapper == Wrapper::Raw && self.bits.bits_consumed() == 0 && self.window.is_empty() =>
            {
                self.window.extend(dict.as_bytes());
                Ok(())
            }
            _ => Err(FlateError::stream("dictionary not expected in this state")),
        }
    }

    fn logical_checksum(&self) -> u32 {
        match (self.prefix, self.check_kind) {
            (Some(prefix), Some(kind)) => {
                checksum::combine(kind, prefix, self.member_check, self.member_len)
            }
            _ => self.member_check,
        }
    }

    /// Account for freshly produced output.
    fn absorb_output(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.member_len += data.len() as u64;
        if let (true, Some(kind)) = (self.validate, self.check_kind) {
            self.member_check = checksum::update(kind, self.member_check, data);
            self.state.checksum = self.logical_checksum();
        }
    }

    /// Take `N` gzip header bytes (already buffered), tracking the header CRC.
    fn header_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        for byte in &mut out {
            *byte = self.bits.take(8) as u8;
        }
        self.head_crc = crc32(self.head_crc, &out);
        out
    }

    /// Read a zero-terminated gzip field into `self.field`; true once the
    /// terminator has been seen.
    fn read_terminated(&mut self, input: &[u8], pos: &mut usize) -> bool {
        while self.bits.need(8, input, pos) {
            let [byte] = self.header_bytes::<1>();
            if byte == 0 {
                return true;
            }
            self.field.push(byte);
        }
        false
    }

    /// Decode one call's worth of data.
    pub fn process(&mut self, buffers: &mut StreamBuffers<'_>) -> Result<Status> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        match self.mode {
            Mode::Done => return Ok(Status::StreamEnd),
            Mode::NeedDict => return Ok(Status::NeedDict),
            _ => {}
        }

        let (input, start_in) = buffers.input_parts();
        let start_out = buffers.output_produced();
        let mut pos = start_in;
        let mut checked = start_out;

        let result = self.run(input, &mut pos, buffers, &mut checked);
        if let Ok(Stop::OutputFull | Stop::NeedDict | Stop::End) = result {
            pos -= self.bits.give_back(pos - start_in);
        }
        buffers.set_input_consumed(pos);
        let tail = buffers.produced_since(checked);
        self.absorb_output(tail);

        let consumed = pos - start_in;
        let produced = buffers.output_produced() - start_out;
        self.state.advance(consumed, produced);

        let status = match result {
            Ok(Stop::End) => Status::StreamEnd,
            Ok(Stop::NeedDict) => Status::NeedDict,
            Ok(_) if consumed == 0 && produced == 0 => Status::BufError,
            Ok(_) => Status::Ok,
            Err(err) => {
                warn!(error = %err, "decoder entered error state");
                self.state.record_error(&err);
                self.error = Some(err.clone());
                return Err(err);
            }
        };
        self.state.status = status;
        Ok(status)
    }

    fn run(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        buffers: &mut StreamBuffers<'_>,
        checked: &mut usize,
    ) -> Result<Stop> {
        loop {
            match self.mode {
                Mode::Header => match self.wrapper {
                    Wrapper::Raw => self.mode = Mode::BlockHeader,
                    Wrapper::Auto => {
                        if !self.bits.need(16, input, pos) {
                            return Ok(Stop::Starved);
                        }
                        let magic = u16::from_le_bytes(GZIP_MAGIC) as u32;
                        self.wrapper = if self.bits.peek(16) == magic {
                            Wrapper::Gzip
                        } else {
                            Wrapper::Zlib
                        };
                    }
                    Wrapper::Zlib => {
                        if !self.bits.need(16, input, pos) {
                            return Ok(Stop::Starved);
                        }
                        let cmf = self.bits.take(8);
                        let flg = self.bits.take(8);
                        if ((cmf << 8) | flg) % 31 != 0 {
                            return Err(corrupt(&self.bits, "incorrect header check"));
                        }
                        if cmf & 0x0F != CM_DEFLATE as u32 {
                            return Err(corrupt(&self.bits, "unknown compression method"));
                        }
                        if (cmf >> 4) + 8 > self.config.window_bits as u32 {
                            return Err(corrupt(&self.bits, "invalid window size"));
                        }
                        self.check_kind = Some(ChecksumKind::Adler32);
                        self.member_check = checksum::identity(ChecksumKind::Adler32);
                        debug!(window_bits = (cmf >> 4) + 8, fdict = flg & 0x20 != 0, "zlib header");
                        self.mode = if flg & 0x20 != 0 {
                            Mode::DictId
                        } else {
                            Mode::BlockHeader
                        };
                    }
                    Wrapper::Gzip => {
                        if !self.bits.need(32, input, pos) {
                            return Ok(Stop::Starved);
                        }
                        self.head_crc = 0;
                        let [id1, id2, cm, flg] = self.header_bytes::<4>();
                        if [id1, id2] != GZIP_MAGIC {
                            return Err(corrupt(&self.bits, "incorrect header check"));
                        }
                        if cm != CM_DEFLATE {
                            return Err(corrupt(&self.bits, "unknown compression method"));
                        }
                        if flg & flags::RESERVED != 0 {
                            return Err(corrupt(&self.bits, "unknown header flags set"));
                        }
                        self.gz_flags = flg;
                        self.header = Some(GzipHeader {
                            text: flg & flags::FTEXT != 0,
                            has_crc16: flg & flags::FHCRC != 0,
                            ..GzipHeader::default()
                        });
                        self.check_kind = Some(ChecksumKind::Crc32);
                        self.member_check = checksum::identity(ChecksumKind::Crc32);
                        if self.prefix.is_none() {
                            self.state.checksum = self.member_check;
                        }
                        self.mode = Mode::GzipTime;
                    }
                },

                Mode::GzipTime => {
                    if !self.bits.need(32, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    let mtime = u32::from_le_bytes(self.header_bytes::<4>());
                    if let Some(header) = &mut self.header {
                        header.mtime = mtime;
                    }
                    self.mode = Mode::GzipOs;
                }

                Mode::GzipOs => {
                    if !self.bits.need(16, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    let [xfl, os] = self.header_bytes::<2>();
                    if let Some(header) = &mut self.header {
                        header.xfl = xfl;
                        header.os = os;
                    }
                    self.mode = Mode::GzipExtraLen;
                }

                Mode::GzipExtraLen => {
                    if self.gz_flags & flags::FEXTRA == 0 {
                        self.mode = Mode::GzipName;
                        continue;
                    }
                    if !self.bits.need(16, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    let remaining = u16::from_le_bytes(self.header_bytes::<2>()) as usize;
                    self.field.clear();
                    self.mode = Mode::GzipExtra { remaining };
                }

                Mode::GzipExtra { mut remaining } => {
                    while remaining > 0 && self.bits.need(8, input, pos) {
                        let [byte] = self.header_bytes::<1>();
                        self.field.push(byte);
                        remaining -= 1;
                    }
                    if remaining > 0 {
                        self.mode = Mode::GzipExtra { remaining };
                        return Ok(Stop::Starved);
                    }
                    let extra = std::mem::take(&mut self.field);
                    if let Some(header) = &mut self.header {
                        header.extra = Some(extra);
                    }
                    self.mode = Mode::GzipName;
                }

                Mode::GzipName => {
                    if self.gz_flags & flags::FNAME != 0 {
                        if !self.read_terminated(input, pos) {
                            return Ok(Stop::Starved);
                        }
                        let name = decode_latin1(&self.field);
                        self.field.clear();
                        if let Some(header) = &mut self.header {
                            header.name = Some(name);
                        }
                    }
                    self.mode = Mode::GzipComment;
                }

                Mode::GzipComment => {
                    if self.gz_flags & flags::FCOMMENT != 0 {
                        if !self.read_terminated(input, pos) {
                            return Ok(Stop::Starved);
                        }
                        let comment = decode_latin1(&self.field);
                        self.field.clear();
                        if let Some(header) = &mut self.header {
                            header.comment = Some(comment);
                        }
                    }
                    self.mode = Mode::GzipHeaderCrc;
                }

                Mode::GzipHeaderCrc => {
                    if self.gz_flags & flags::FHCRC != 0 {
                        if !self.bits.need(16, input, pos) {
                            return Ok(Stop::Starved);
                        }
                        let expected = self.bits.take(16);
                        if self.validate && expected != self.head_crc & 0xFFFF {
                            return Err(corrupt(&self.bits, "header crc mismatch"));
                        }
                    }
                    if let Some(header) = &mut self.header {
                        header.done = true;
                        debug!(name = ?header.name, mtime = header.mtime, "gzip header");
                    }
                    self.mode = Mode::BlockHeader;
                }

                Mode::DictId => {
                    if !self.bits.need(32, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    self.dict_id = self.bits.take(32).swap_bytes();
                    self.state.checksum = self.dict_id;
                    self.mode = Mode::NeedDict;
                    debug!(id = self.dict_id, "stream requires a dictionary");
                }

                Mode::NeedDict => return Ok(Stop::NeedDict),

                Mode::BlockHeader => {
                    if self.last_block {
                        self.bits.align();
                        self.mode = Mode::Check;
                        continue;
                    }
                    if !self.bits.need(3, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    let header = self.bits.take(3);
                    self.last_block = header & 1 != 0;
                    self.empty_stored = false;
                    trace!(btype = header >> 1, last = self.last_block, "block header");
                    match header >> 1 {
                        0 => {
                            self.bits.align();
                            self.mode = Mode::StoredLen;
                        }
                        1 => {
                            self.dynamic = None;
                            self.mode = Mode::Codes;
                        }
                        2 => self.mode = Mode::TableSizes,
                        _ => return Err(corrupt(&self.bits, "invalid block type")),
                    }
                }

                Mode::StoredLen => {
                    if !self.bits.need(32, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    let len = self.bits.take(16);
                    let nlen = self.bits.take(16);
                    if len != !nlen & 0xFFFF {
                        return Err(corrupt(&self.bits, "invalid stored block lengths"));
                    }
                    if len == 0 {
                        self.empty_stored = true;
                        self.mode = Mode::BlockHeader;
                    } else {
                        self.mode = Mode::Stored {
                            remaining: len as usize,
                        };
                    }
                }

                Mode::Stored { mut remaining } => {
                    while remaining > 0 && buffers.available_output() > 0 {
                        match self.bits.take_byte() {
                            Some(byte) => {
                                buffers.write(&[byte]);
                                self.window.push(byte);
                                remaining -= 1;
                            }
                            None => break,
                        }
                    }
                    if self.bits.is_empty() {
                        let n = remaining
                            .min(buffers.available_output())
                            .min(input.len() - *pos);
                        let chunk = &input[*pos..*pos + n];
                        buffers.write(chunk);
                        self.window.extend(chunk);
                        *pos += n;
                        remaining -= n;
                    }
                    if remaining == 0 {
                        self.mode = Mode::BlockHeader;
                    } else {
                        self.mode = Mode::Stored { remaining };
                        return Ok(if buffers.available_output() == 0 {
                            Stop::OutputFull
                        } else {
                            Stop::Starved
                        });
                    }
                }

                Mode::TableSizes => {
                    if !self.bits.need(14, input, pos) {
                        return Ok(Stop::Starved);
                    }
                    self.hlit = self.bits.take(5) as usize + 257;
                    self.hdist = self.bits.take(5) as usize + 1;
                    self.hclen = self.bits.take(4) as usize + 4;
                    if self.hlit > 286 || self.hdist > 30 {
                        return Err(corrupt(&self.bits, "too many length or distance symbols"));
                    }
                    self.lens.fill(0);
                    self.mode = Mode::CodeLengthLens { index: 0 };
                }

                Mode::CodeLengthLens { mut index } => {
                    while index < self.hclen {
                        if !self.bits.need(3, input, pos) {
                            self.mode = Mode::CodeLengthLens { index };
                            return Ok(Stop::Starved);
                        }
                        self.lens[CODE_LENGTH_ORDER[index]] = self.bits.take(3) as u8;
                        index += 1;
                    }
                    let table = HuffmanTable::from_lengths(&self.lens[..19])
                        .map_err(|_| corrupt(&self.bits, "invalid code lengths set"))?;
                    self.codelen = Some(table);
                    self.lens.fill(0);
                    self.mode = Mode::CodeLens { index: 0 };
                }

                Mode::CodeLens { mut index } => {
                    let total = self.hlit + self.hdist;
                    let Some(table) = &self.codelen else {
                        return Err(corrupt(&self.bits, "invalid code lengths set"));
                    };
                    while index < total {
                        self.bits.fill(input, pos);
                        let hold = self.bits.hold();
                        let avail = self.bits.available();
                        let (symbol, code_len) = match table.lookup(hold, avail) {
                            Lookup::Symbol { symbol, length } => (symbol, length as u32),
                            Lookup::NeedMore => {
                                self.mode = Mode::CodeLens { index };
                                return Ok(Stop::Starved);
                            }
                            Lookup::Invalid => {
                                return Err(corrupt(&self.bits, "invalid bit length code"));
                            }
                        };
                        if symbol < 16 {
                            self.bits.consume(code_len);
                            self.lens[index] = symbol as u8;
                            index += 1;
                            continue;
                        }
                        let (extra, base) = match symbol {
                            16 => (2, 3),
                            17 => (3, 3),
                            _ => (7, 11),
                        };
                        if avail < code_len + extra {
                            self.mode = Mode::CodeLens { index };
                            return Ok(Stop::Starved);
                        }
                        let repeat = base + low_bits(hold >> code_len, extra);
                        let value = if symbol == 16 {
                            if index == 0 {
                                return Err(corrupt(&self.bits, "invalid bit length repeat"));
                            }
                            self.lens[index - 1]
                        } else {
                            0
                        };
                        if index + repeat > total {
                            return Err(corrupt(&self.bits, "invalid bit length repeat"));
                        }
                        self.bits.consume(code_len + extra);
                        self.lens[index..index + repeat].fill(value);
                        index += repeat;
                    }

                    if self.lens[END_OF_BLOCK as usize] == 0 {
                        return Err(corrupt(&self.bits, "invalid code -- missing end-of-block"));
                    }
                    let litlen = HuffmanTable::from_lengths(&self.lens[..self.hlit])
                        .map_err(|_| corrupt(&self.bits, "invalid literal/lengths set"))?;
                    let dist = HuffmanTable::from_lengths(&self.lens[self.hlit..total])
                        .map_err(|_| corrupt(&self.bits, "invalid distances set"))?;
                    self.dynamic = Some((litlen, dist));
                    self.codelen = None;
                    self.mode = Mode::Codes;
                }

                Mode::Codes => {
                    let (litlen, dist) = match &self.dynamic {
                        Some((litlen, dist)) => (litlen, dist),
                        None => (fixed_litlen_table()?, fixed_distance_table()?),
                    };
                    let exit = decode_codes(
                        &mut self.bits,
                        &mut self.window,
                        litlen,
                        dist,
                        input,
                        pos,
                        buffers,
                    )?;
                    match exit {
                        CodesExit::EndOfBlock => self.mode = Mode::BlockHeader,
                        CodesExit::OutputFull => return Ok(Stop::OutputFull),
                        CodesExit::Starved => return Ok(Stop::Starved),
                        CodesExit::Pending { length, distance } => {
                            self.mode = Mode::Copy { length, distance };
                            return Ok(Stop::OutputFull);
                        }
                    }
                }

                Mode::Copy { length, distance } => {
                    let copied = self.window.copy_match(distance, length, buffers.output_mut());
                    buffers.produce(copied);
                    if copied < length {
                        self.mode = Mode::Copy {
                            length: length - copied,
                            distance,
                        };
                        return Ok(Stop::OutputFull);
                    }
                    self.mode = Mode::Codes;
                }

                Mode::Check => {
                    let fresh = buffers.produced_since(*checked);
                    self.absorb_output(fresh);
                    *checked = buffers.output_produced();

                    let trailer_bits = match self.wrapper {
                        Wrapper::Zlib => 32,
                        Wrapper::Gzip => 64,
                        Wrapper::Raw | Wrapper::Auto => 0,
                    };
                    if trailer_bits > 0 && !self.bits.need(trailer_bits, input, pos) {
                        if self.validate {
                            return Ok(Stop::Starved);
                        }
                        self.mode = Mode::Done;
                        continue;
                    }
                    match self.wrapper {
                        Wrapper::Zlib => {
                            let expected = self.bits.take(32).swap_bytes();
                            if self.validate && expected != self.member_check {
                                return Err(FlateError::checksum_mismatch(
                                    expected,
                                    self.member_check,
                                ));
                            }
                        }
                        Wrapper::Gzip => {
                            let expected = self.bits.take(32);
                            let isize = self.bits.take(32);
                            if self.validate && expected != self.member_check {
                                return Err(FlateError::checksum_mismatch(
                                    expected,
                                    self.member_check,
                                ));
                            }
                            if self.validate && isize != self.member_len as u32 {
                                return Err(corrupt(&self.bits, "incorrect length check"));
                            }
                        }
                        Wrapper::Raw | Wrapper::Auto => {}
                    }
                    self.mode = Mode::Done;
                }

                Mode::Done => return Ok(Stop::End),
            }
        }
    }

    /// Skip ahead to the next flush marker (`00 00 FF FF`).
    ///
    /// Returns the number of input bytes examined. On success the decoder
    /// waits for a block header with an empty window and trailer validation
    /// off; otherwise `BufError` is returned and the partial match is kept
    /// for the next call.
    pub fn sync(&mut self, input: &[u8]) -> Result<(usize, Status)> {
        if !self.syncing {
            self.syncing = true;
            self.sync_have = 0;
            self.bits.align();
            let mut held = Vec::with_capacity(8);
            while let Some(byte) = self.bits.take_byte() {
                held.push(byte);
            }
            sync_search(&mut self.sync_have, &held);
        }

        let examined = if self.sync_have < 4 {
            sync_search(&mut self.sync_have, input)
        } else {
            0
        };
        self.state.total_in += examined as u64;
        if self.sync_have < 4 {
            self.state.status = Status::BufError;
            return Ok((examined, Status::BufError));
        }

        self.bits.clear();
        self.window.clear();
        self.mode = Mode::BlockHeader;
        self.last_block = false;
        self.empty_stored = false;
        self.dynamic = None;
        self.codelen = None;
        self.validate = false;
        self.error = None;
        self.state.clear_error();
        self.state.status = Status::Ok;
        self.syncing = false;
        self.sync_have = 0;
        debug!(total_in = self.state.total_in, "resynchronized at flush marker");
        Ok((examined, Status::Ok))
    }
}

impl Decompressor for Decoder {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, Status)> {
        let mut buffers = StreamBuffers::new(input, output);
        let status = self.process(&mut buffers)?;
        Ok((buffers.input_consumed(), buffers.output_produced(), status))
    }

    fn reset(&mut self) {
        Decoder::reset(self);
    }

    fn is_finished(&self) -> bool {
        Decoder::is_finished(self)
    }
}

/// Decompress a complete raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::raw().decompress_all(data)
}
