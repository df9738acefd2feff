//! Streaming DEFLATE compression.
//!
//! [`Encoder`] absorbs input into the LZ77 window, tokenizes it into a block
//! buffer and closes blocks in whichever of the stored, fixed and dynamic
//! forms is smallest. Compressed bits queue in a [`BitSink`] and are drained
//! into the caller's output slice, so any output size works.
//!
//! ```
//! use oxiflate_core::{FlushMode, Status, StreamBuffers};
//! use oxiflate_deflate::{Encoder, EncoderConfig};
//!
//! let mut encoder = Encoder::new(EncoderConfig::new().level(6)).unwrap();
//! let mut out = vec![0u8; encoder.bound(11) as usize];
//! let mut buffers = StreamBuffers::new(b"hello world", &mut out);
//! let status = encoder.process(&mut buffers, FlushMode::Finish).unwrap();
//! assert_eq!(status, Status::StreamEnd);
//! ```

use crate::block::{BlockBuffer, write_stored};
use crate::bound::compress_bound;
use crate::config::{EncoderConfig, Strategy, Wrapper};
use crate::gzip::{CM_DEFLATE, GzipHeader, xfl_for};
use crate::lz77::{MatchParams, Matcher};
use oxiflate_core::bitstream::BitSink;
use oxiflate_core::checksum::{self, ChecksumKind};
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::stream::{CodecState, FlushMode, Status, StreamBuffers};
use oxiflate_core::traits::Compressor;
use oxiflate_core::window::Dictionary;
use tracing::{debug, warn};

/// Most bits `prime` may inject in total.
const MAX_PRIMED_BITS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing written yet.
    Init,
    Active,
    /// `Finish` requested, trailer not yet delivered.
    Flushing,
    Finished,
    Error,
}

/// Streaming DEFLATE/zlib/gzip encoder.
#[derive(Debug, Clone)]
pub struct Encoder {
    config: EncoderConfig,
    phase: Phase,
    matcher: Matcher,
    block: BlockBuffer,
    sink: BitSink,
    state: CodecState,
    check_kind: Option<ChecksumKind>,
    /// Checksum of the current member's input.
    member_check: u32,
    member_len: u64,
    /// Logical checksum of earlier members.
    prefix: Option<u32>,
    dictionary: Option<Dictionary>,
    primed_bits: u32,
    primed_value: u64,
    /// No input has arrived since the last sync or full flush.
    flush_done: bool,
    error: Option<FlateError>,
}

impl Encoder {
    /// Create an encoder.
    pub fn new(config: EncoderConfig) -> Result<Self> {
        config.validate()?;
        let matcher = Matcher::new(
            config.effective_window_bits(),
            config.hash_bits(),
            config.level,
            config.strategy,
        )?;
        let block = BlockBuffer::new(config.symbol_capacity())?;
        let check_kind = match config.wrapper {
            Wrapper::Zlib => Some(ChecksumKind::Adler32),
            Wrapper::Gzip => Some(ChecksumKind::Crc32),
            Wrapper::Raw | Wrapper::Auto => None,
        };
        let member_check = check_kind.map_or(0, checksum::identity);
        Ok(Self {
            config,
            phase: Phase::Init,
            matcher,
            block,
            sink: BitSink::new(),
            state: CodecState::new(member_check),
            check_kind,
            member_check,
            member_len: 0,
            prefix: None,
            dictionary: None,
            primed_bits: 0,
            primed_value: 0,
            flush_done: false,
            error: None,
        })
    }

    /// Raw DEFLATE encoder at `level`.
    pub fn raw(level: u8) -> Result<Self> {
        Self::new(EncoderConfig::new().level(level).wrapper(Wrapper::Raw))
    }

    /// zlib encoder at `level`.
    pub fn zlib(level: u8) -> Result<Self> {
        Self::new(EncoderConfig::new().level(level))
    }

    /// gzip encoder at `level` with the default header.
    pub fn gzip(level: u8) -> Result<Self> {
        Self::new(EncoderConfig::new().level(level).wrapper(Wrapper::Gzip))
    }

    /// Current configuration.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Stream counters and last status.
    pub fn state(&self) -> &CodecState {
        &self.state
    }

    /// Total bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.state.total_in
    }

    /// Total compressed bytes produced.
    pub fn total_out(&self) -> u64 {
        self.state.total_out
    }

    /// Running checksum of the input (zlib: Adler-32, gzip: CRC-32).
    pub fn checksum(&self) -> u32 {
        self.state.checksum
    }

    /// Whether the trailer has been written and delivered.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished && self.sink.is_drained()
    }

    /// Independent copy of the whole stream state.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Undelivered output: whole bytes and bits in the partial byte.
    pub fn pending(&self) -> (usize, u32) {
        (self.sink.pending_bytes(), self.sink.partial_bits())
    }

    /// Output size that lets one `Finish` call with `input_len` more bytes
    /// complete, given what this stream already holds.
    pub fn bound(&self, input_len: u64) -> u64 {
        let buffered = (self.matcher.lookahead() + self.block.raw_len()) as u64;
        let pending = self.sink.pending_bytes() as u64 + 1;
        let primed = self.primed_bits.div_ceil(8) as u64;
        compress_bound(input_len + buffered, &self.config) + pending + primed
    }

    /// Return to `Init`, keeping the configuration.
    pub fn reset(&mut self) {
        self.phase = Phase::Init;
        self.matcher.reset();
        self.matcher.set_level(self.config.level, self.config.strategy);
        self.block.clear();
        self.sink.clear();
        self.member_check = self.check_kind.map_or(0, checksum::identity);
        self.member_len = 0;
        self.prefix = None;
        self.state = CodecState::new(self.member_check);
        self.dictionary = None;
        self.primed_bits = 0;
        self.primed_value = 0;
        self.flush_done = false;
        self.error = None;
        debug!(level = self.config.level, "encoder reset");
    }

    /// Start a new member, keeping totals and folding this member's
    /// checksum into the running value.
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
    }

    /// Change level and strategy mid-stream.
    ///
    /// Everything consumed so far, including untokenized lookahead, is
    /// closed into blocks with the old parameters first.
    pub fn reconfigure(&mut self, level: u8, strategy: Strategy) -> Result<()> {
        if matches!(self.phase, Phase::Flushing | Phase::Finished | Phase::Error) {
            return Err(FlateError::stream("cannot reconfigure a finishing stream"));
        }
        if level > 9 {
            return Err(FlateError::stream(format!("level {} outside 0..=9", level)));
        }
        if level == self.config.level && strategy == self.config.strategy {
            return Ok(());
        }
        let (old_level, old_strategy) = (self.config.level, self.config.strategy);
        loop {
            if self.block.is_full() {
                self.block.flush(&mut self.sink, false, old_level, old_strategy)?;
            }
            let pos = self.matcher.position();
            match self.matcher.next_token(true) {
                Some(token) => self.block.push(token, self.matcher.bytes(pos, token.span())),
                None => break,
            }
        }
        if !self.block.is_empty() {
            self.block.flush(&mut self.sink, false, old_level, old_strategy)?;
        }
        debug!(
            from_level = self.config.level,
            to_level = level,
            ?strategy,
            "encoder reconfigured"
        );
        self.config.level = level;
        self.config.strategy = strategy;
        self.matcher.set_level(level, strategy);
        Ok(())
    }

    /// Override the level's match-search parameters.
    pub fn tune(&mut self, good_length: u16, max_lazy: u16, nice_length: u16, max_chain: u16) {
        self.matcher.tune(MatchParams {
            good_length,
            max_lazy,
            nice_length,
            max_chain,
        });
    }

    /// Replace the gzip header. Only before the first call.
    pub fn set_header(&mut self, header: GzipHeader) -> Result<()> {
        if self.phase != Phase::Init || self.config.wrapper != Wrapper::Gzip {
            return Err(FlateError::stream(
                "gzip header can only be set on a fresh gzip stream",
            ));
        }
        self.config.header = Some(header);
        Ok(())
    }

    /// Load a preset dictionary. Only before the first call; not for gzip.
    pub fn set_dictionary(&mut self, bytes: &[u8]) -> Result<()> {
        if self.phase != Phase::Init {
            return Err(FlateError::stream("dictionary must be set before compressing"));
        }
        if self.config.wrapper == Wrapper::Gzip {
            return Err(FlateError::stream("gzip streams cannot use a dictionary"));
        }
        let dict = Dictionary::new(bytes, self.config.window_size());
        self.matcher.set_dictionary(dict.as_bytes());
        if self.config.wrapper == Wrapper::Zlib {
            self.state.checksum = dict.id();
        }
        self.dictionary = Some(dict);
        Ok(())
    }

    /// Current history window.
    pub fn dictionary(&self) -> Vec<u8> {
        self.matcher.history().to_vec()
    }

    /// Queue `bits` bits of `value` to follow the wrapper header.
    pub fn prime(&mut self, bits: u32, value: u32) -> Result<()> {
        if self.phase != Phase::Init {
            return Err(FlateError::stream("prime is only valid before compressing"));
        }
        if bits > 16 || self.primed_bits + bits > MAX_PRIMED_BITS {
            return Err(FlateError::stream(format!(
                "cannot prime {} bits with {} already queued",
                bits, self.primed_bits
            )));
        }
        let masked = (value as u64) & ((1u64 << bits) - 1);
        self.primed_value |= masked << self.primed_bits;
        self.primed_bits += bits;
        Ok(())
    }

    fn zlib_header(&self) -> Vec<u8> {
        let cmf = ((self.config.effective_window_bits() - 8) << 4) | CM_DEFLATE;
        let flevel = if self.config.strategy >= Strategy::HuffmanOnly || self.config.level < 2 {
            0
        } else if self.config.level < 6 {
            1
        } else if self.config.level == 6 {
            2
        } else {
            3
        };
        let mut flg: u8 = flevel << 6;
        if self.dictionary.is_some() {
            flg |= 0x20;
        }
        let check = (((cmf as u16) << 8) | flg as u16) % 31;
        if check != 0 {
            flg += (31 - check) as u8;
        }

        let mut header = vec![cmf, flg];
        if let Some(dict) = &self.dictionary {
            header.extend_from_slice(&dict.id().to_be_bytes());
        }
        header
    }

    fn gzip_header(&self) -> Vec<u8> {
        let xfl = xfl_for(
            self.config.level,
            matches!(self.config.strategy, Strategy::HuffmanOnly | Strategy::Rle),
        );
        self.config
            .header
            .clone()
            .unwrap_or_default()
            .to_bytes(xfl)
    }

    /// Wrapper header and primed bits.
    fn start(&mut self) {
        let header = match self.config.wrapper {
            Wrapper::Zlib => self.zlib_header(),
            Wrapper::Gzip => self.gzip_header(),
            Wrapper::Raw | Wrapper::Auto => Vec::new(),
        };
        self.sink.put_header_bytes(&header);
        if self.config.wrapper == Wrapper::Zlib {
            // The trailer covers the data only; a carried prefix stays.
            self.state.checksum = self.prefix.unwrap_or(self.member_check);
        }

        let mut bits = self.primed_bits;
        let mut value = self.primed_value;
        while bits > 0 {
            let n = bits.min(32);
            self.sink.put_bits(value as u32, n);
            value >>= n;
            bits -= n;
        }
        self.primed_bits = 0;
        self.primed_value = 0;
    }

    fn absorb_input(&mut self, data: &[u8]) {
        self.member_len += data.len() as u64;
        if let Some(kind) = self.check_kind {
            self.member_check = checksum::update(kind, self.member_check, data);
            self.state.checksum = match self.prefix {
                Some(prefix) => checksum::combine(kind, prefix, self.member_check, self.member_len),
                None => self.member_check,
            };
        }
    }

    fn write_trailer(&mut self) {
        match self.config.wrapper {
            Wrapper::Zlib => self.sink.put_bytes(&self.member_check.to_be_bytes()),
            Wrapper::Gzip => {
                self.sink.put_bytes(&self.member_check.to_le_bytes());
                self.sink.put_bytes(&(self.member_len as u32).to_le_bytes());
            }
            Wrapper::Raw | Wrapper::Auto => {}
        }
    }

    /// Compress one call's worth of data.
    pub fn process(&mut self, buffers: &mut StreamBuffers<'_>, flush: FlushMode) -> Result<Status> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if matches!(self.phase, Phase::Flushing | Phase::Finished) && flush != FlushMode::Finish {
            return Err(FlateError::stream("only Finish is allowed after Finish"));
        }
        if self.phase == Phase::Finished && self.sink.is_drained() {
            let status = if buffers.remaining_input().is_empty() {
                Status::StreamEnd
            } else {
                Status::BufError
            };
            self.state.status = status;
            return Ok(status);
        }
        if buffers.available_output() == 0 {
            self.state.status = Status::BufError;
            return Ok(Status::BufError);
        }

        if self.phase == Phase::Init {
            self.start();
            self.phase = Phase::Active;
        }
        if flush == FlushMode::Finish && self.phase == Phase::Active {
            self.phase = Phase::Flushing;
        }

        let start_in = buffers.input_consumed();
        let start_out = buffers.output_produced();
        let result = self.run(buffers, flush);
        let consumed = buffers.input_consumed() - start_in;
        let produced = buffers.output_produced() - start_out;
        self.state.advance(consumed, produced);
        self.state.flush_mode = flush;

        if let Err(err) = result {
            warn!(error = %err, "encoder entered error state");
            self.phase = Phase::Error;
            self.state.record_error(&err);
            self.error = Some(err.clone());
            return Err(err);
        }

        let status = if self.is_finished() {
            Status::StreamEnd
        } else if consumed == 0 && produced == 0 {
            Status::BufError
        } else {
            Status::Ok
        };
        self.state.status = status;
        Ok(status)
    }

    fn run(&mut self, buffers: &mut StreamBuffers<'_>, flush: FlushMode) -> Result<()> {
        let (level, strategy) = (self.config.level, self.config.strategy);
        loop {
            if !self.sink.is_drained() {
                let n = self.sink.drain_into(buffers.output_mut());
                buffers.produce(n);
                if !self.sink.is_drained() {
                    return Ok(());
                }
            }
            if self.phase == Phase::Finished {
                return Ok(());
            }

            let input = buffers.remaining_input();
            let absorbed = self.matcher.fill(input);
            if absorbed > 0 {
                self.absorb_input(&input[..absorbed]);
                buffers.consume(absorbed);
                self.flush_done = false;
            }
            let flushing = flush != FlushMode::None && buffers.remaining_input().is_empty();

            let mut tokenized = false;
            let mut emitted = false;
            loop {
                if self.block.is_full() {
                    self.block.flush(&mut self.sink, false, level, strategy)?;
                    emitted = true;
                    break;
                }
                let pos = self.matcher.position();
                match self.matcher.next_token(flushing) {
                    Some(token) => {
                        self.block.push(token, self.matcher.bytes(pos, token.span()));
                        tokenized = true;
                    }
                    None => break,
                }
            }
            if emitted {
                continue;
            }
            if !buffers.remaining_input().is_empty() {
                if absorbed > 0 || tokenized {
                    continue;
                }
                return Ok(());
            }

            match flush {
                FlushMode::None => return Ok(()),
                FlushMode::Sync | FlushMode::Full => {
                    if self.flush_done {
                        return Ok(());
                    }
                    if !self.block.is_empty() {
                        self.block.flush(&mut self.sink, false, level, strategy)?;
                    }
                    self.sink.try_reserve(8)?;
                    write_stored(&mut self.sink, &[], false);
                    if flush == FlushMode::Full {
                        self.matcher.clear_history();
                    }
                    self.flush_done = true;
                }
                FlushMode::Finish => {
                    self.block.flush(&mut self.sink, true, level, strategy)?;
                    self.sink.align();
                    self.write_trailer();
                    self.phase = Phase::Finished;
                }
            }
        }
    }
}

impl Compressor for Encoder {
    fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, Status)> {
        let mut buffers = StreamBuffers::new(input, output);
        let status = self.process(&mut buffers, flush)?;
        Ok((buffers.input_consumed(), buffers.output_produced(), status))
    }

    fn reset(&mut self) {
        Encoder::reset(self);
    }

    fn is_finished(&self) -> bool {
        Encoder::is_finished(self)
    }
}

/// Compress `data` into a raw DEFLATE stream.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    Encoder::raw(level)?.compress_all(data)
}
