//! Buffered gzip file handle.

use crate::mode::{Access, GzMode};
use oxiflate_core::error::{FlateError, Result};
use oxiflate_core::stream::{FlushMode, Status, StreamBuffers};
use oxiflate_deflate::gzip::GZIP_MAGIC;
use oxiflate_deflate::{Decoder, Encoder, EncoderConfig, Strategy, Wrapper};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Default size of the raw input buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Smallest accepted buffer size.
const MIN_BUFFER_SIZE: usize = 8;

fn truncated(offset: u64) -> FlateError {
    FlateError::data(offset, "unexpected end of file")
}

/// How reads are being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum How {
    /// Next bytes decide between a gzip member and plain data.
    Look,
    /// Decoding a gzip member.
    Gzip,
    /// Forwarding bytes unchanged.
    Copy,
}

/// A gzip file open for reading or writing.
///
/// Reads transparently decode concatenated gzip members and pass anything
/// that is not gzip through unchanged. Writes produce a gzip member, or raw
/// bytes in transparent mode. The handle implements [`Read`], [`Write`] and
/// [`Seek`] so it composes with the rest of `std::io`; `write!` gives
/// formatted output.
///
/// ```
/// use oxiflate_gzip::GzFile;
/// use std::io::{Cursor, Read, Write};
///
/// let mut file = GzFile::new(Cursor::new(Vec::new()), "w9").unwrap();
/// write!(file, "{} bottles", 99).unwrap();
/// let bytes = file.finish().unwrap().into_inner();
///
/// let mut file = GzFile::new(Cursor::new(bytes), "r").unwrap();
/// let mut text = String::new();
/// file.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "99 bottles");
/// ```
#[derive(Debug)]
pub struct GzFile<S: Read + Write + Seek = File> {
    stream: Option<S>,
    mode: GzMode,
    buffer_size: usize,
    started: bool,
    /// Raw stream position where the file content begins.
    start: u64,
    /// Raw bytes read from or written to the stream since `start`.
    raw: u64,
    /// Uncompressed position.
    position: u64,
    error: Option<FlateError>,

    encoder: Option<Encoder>,
    /// The current member is complete; the next write starts another.
    member_done: bool,

    decoder: Option<Decoder>,
    how: How,
    members: u64,
    input: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    output: Vec<u8>,
    out_pos: usize,
    out_len: usize,
    ungot: Vec<u8>,
    /// The underlying stream reported end of file.
    eof: bool,
    /// A read asked for data beyond the end.
    past: bool,
}

impl GzFile<File> {
    /// Open `path` with a `gzopen`-style mode string.
    pub fn open<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        let path = path.as_ref();
        let parsed: GzMode = mode.parse()?;
        let mut options = OpenOptions::new();
        match parsed.access {
            Access::Read => options.read(true),
            Access::Write => options.write(true).create(true).truncate(true),
            Access::Append => options.append(true).create(true),
        };
        let file = options
            .open(path)
            .map_err(|err| FlateError::from_open(err, path))?;
        debug!(path = %path.display(), mode = %parsed, "gzip file opened");
        Self::with_mode(file, parsed)
    }
}

impl<S: Read + Write + Seek> GzFile<S> {
    /// Wrap an open stream with a mode string.
    pub fn new(stream: S, mode: &str) -> Result<Self> {
        Self::with_mode(stream, mode.parse()?)
    }

    /// Wrap an open stream with a parsed mode.
    pub fn with_mode(mut stream: S, mode: GzMode) -> Result<Self> {
        let start = match mode.access {
            Access::Append => stream.seek(SeekFrom::End(0))?,
            Access::Read | Access::Write => stream.stream_position()?,
        };
        Ok(Self {
            stream: Some(stream),
            mode,
            buffer_size: DEFAULT_BUFFER_SIZE,
            started: false,
            start,
            raw: 0,
            position: 0,
            error: None,
            encoder: None,
            member_done: false,
            decoder: None,
            how: How::Look,
            members: 0,
            input: Vec::new(),
            in_pos: 0,
            in_len: 0,
            output: Vec::new(),
            out_pos: 0,
            out_len: 0,
            ungot: Vec::new(),
            eof: false,
            past: false,
        })
    }

    /// The mode this file was opened with, including later parameter
    /// changes.
    pub fn mode(&self) -> GzMode {
        self.mode
    }

    fn check_open(&self) -> Result<()> {
        if self.stream.is_none() {
            return Err(FlateError::stream("gzip file is closed"));
        }
        Ok(())
    }

    fn check_writing(&self) -> Result<()> {
        self.check_open()?;
        if !self.mode.is_write() {
            return Err(FlateError::stream("gzip file is not open for writing"));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(())
    }

    fn check_reading(&self) -> Result<()> {
        self.check_open()?;
        if self.mode.is_write() {
            return Err(FlateError::stream("gzip file is not open for reading"));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(())
    }

    /// Remember a fatal error so later calls report it too.
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(error = %err, "gzip file error");
            self.error = Some(err.clone());
        }
        result
    }

    /// Size the raw input buffer. Only before the first read or write.
    pub fn set_buffer_size(&mut self, size: usize) -> Result<()> {
        self.check_open()?;
        if self.started {
            return Err(FlateError::stream(
                "buffer size must be set before the first read or write",
            ));
        }
        self.buffer_size = size.max(MIN_BUFFER_SIZE);
        Ok(())
    }

    /// Change level and strategy for data written from now on.
    pub fn set_params(&mut self, level: u8, strategy: Strategy) -> Result<()> {
        self.check_writing()?;
        if level > 9 {
            return Err(FlateError::stream(format!("level {} outside 0..=9", level)));
        }
        if level == self.mode.level && strategy == self.mode.strategy {
            return Ok(());
        }
        self.mode.level = level;
        self.mode.strategy = strategy;
        if self.member_done {
            // Applied when the next member starts.
            return Ok(());
        }
        if let Some(encoder) = self.encoder.as_mut() {
            let result = encoder.reconfigure(level, strategy);
            self.record(result)?;
            // Deliver the block closed with the old parameters.
            let result = self.pump(&[], FlushMode::None);
            self.record(result)?;
        }
        Ok(())
    }

    /// Last fatal error, if any.
    pub fn error(&self) -> Option<&FlateError> {
        self.error.as_ref()
    }

    /// Forget the last error and any end-of-file condition, so reads can
    /// pick up data appended to a growing file.
    pub fn clear_error(&mut self) {
        self.error = None;
        if !self.mode.is_write() {
            self.eof = false;
            self.past = false;
        }
    }

    /// Uncompressed offset.
    pub fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.position)
    }

    /// Offset in the underlying stream.
    pub fn offset(&self) -> Result<u64> {
        self.check_open()?;
        let buffered = (self.in_len - self.in_pos) as u64;
        Ok(self.start + self.raw - buffered)
    }

    /// Whether a read has gone past the end of the data.
    pub fn eof(&self) -> bool {
        !self.mode.is_write() && self.past
    }

    /// Whether data moves through unchanged: a transparent write, or a read
    /// of a stream that is not gzip.
    pub fn is_passthrough(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.mode.is_write() {
            return Ok(self.mode.transparent);
        }
        if self.how == How::Look && self.out_pos == self.out_len && self.error.is_none() {
            self.start_io()?;
            let result = self.look();
            self.record(result)?;
        }
        Ok(self.how == How::Copy)
    }

    fn stream(&mut self) -> Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| FlateError::stream("gzip file is closed"))
    }

    fn start_io(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        if self.mode.is_write() {
            self.output = vec![0; self.buffer_size * 2];
            if !self.mode.transparent {
                let config = EncoderConfig::new()
                    .wrapper(Wrapper::Gzip)
                    .level(self.mode.level)
                    .strategy(self.mode.strategy);
                self.encoder = Some(Encoder::new(config)?);
            }
        } else {
            self.input = vec![0; self.buffer_size];
            self.output = vec![0; self.buffer_size * 2];
        }
        Ok(())
    }

    // ---- writing ----

    /// Compress `data` into the file. Returns the number of bytes taken,
    /// which is always all of them.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_writing()?;
        self.start_io()?;
        if data.is_empty() {
            return Ok(0);
        }
        let result = self.write_data(data);
        self.record(result)?;
        self.position += data.len() as u64;
        Ok(data.len())
    }

    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if self.mode.transparent {
            self.stream()?.write_all(data)?;
            self.raw += data.len() as u64;
            return Ok(());
        }
        if self.member_done {
            let (level, strategy) = (self.mode.level, self.mode.strategy);
            if let Some(encoder) = self.encoder.as_mut() {
                encoder.reset();
                encoder.reconfigure(level, strategy)?;
            }
            self.member_done = false;
            debug!(position = self.position, "starting new gzip member");
        }
        self.pump(data, FlushMode::None)
    }

    /// Write a string.
    pub fn puts(&mut self, s: &str) -> Result<usize> {
        self.write(s.as_bytes())
    }

    /// Write one byte.
    pub fn putc(&mut self, c: u8) -> Result<()> {
        self.write(&[c]).map(|_| ())
    }

    /// Run the encoder over `data` and write everything it produces.
    fn pump(&mut self, mut data: &[u8], flush: FlushMode) -> Result<()> {
        let (Some(encoder), Some(stream)) = (self.encoder.as_mut(), self.stream.as_mut()) else {
            return Ok(());
        };
        loop {
            let mut buffers = StreamBuffers::new(data, &mut self.output);
            let status = encoder.process(&mut buffers, flush)?;
            let consumed = buffers.input_consumed();
            let produced = buffers.output_produced();
            data = &data[consumed..];
            if produced > 0 {
                stream.write_all(&self.output[..produced])?;
                self.raw += produced as u64;
            }
            match status {
                Status::StreamEnd | Status::BufError => return Ok(()),
                _ if data.is_empty() && produced < self.output.len() => return Ok(()),
                _ => {}
            }
        }
    }

    /// Flush buffered data.
    ///
    /// `None` hands over whatever compressed bytes are ready, `Sync` and
    /// `Full` flush the codec, and `Finish` ends the current gzip member so
    /// that the next write begins a new one.
    pub fn flush(&mut self, mode: FlushMode) -> Result<()> {
        self.check_writing()?;
        self.start_io()?;
        let result = self.flush_data(mode);
        self.record(result)
    }

    fn flush_data(&mut self, mode: FlushMode) -> Result<()> {
        if !self.mode.transparent && !self.member_done {
            self.pump(&[], mode)?;
            if mode == FlushMode::Finish {
                self.member_done = true;
                debug!(position = self.position, "gzip member finished");
            }
        }
        self.stream()?.flush()?;
        Ok(())
    }

    // ---- reading ----

    /// Pull more raw bytes into the input buffer. Returns the count read.
    fn fill_input(&mut self) -> Result<usize> {
        if self.in_pos > 0 {
            self.input.copy_within(self.in_pos..self.in_len, 0);
            self.in_len -= self.in_pos;
            self.in_pos = 0;
        }
        if self.in_len == self.input.len() {
            return Ok(0);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(FlateError::stream("gzip file is closed"));
        };
        let n = loop {
            match stream.read(&mut self.input[self.in_len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            self.eof = true;
        }
        self.in_len += n;
        self.raw += n as u64;
        Ok(n)
    }

    /// Decide what the next bytes are.
    fn look(&mut self) -> Result<()> {
        while self.in_len - self.in_pos < GZIP_MAGIC.len() && !self.eof {
            self.fill_input()?;
        }
        let pending = &self.input[self.in_pos..self.in_len];

        if pending.starts_with(&GZIP_MAGIC) {
            match self.decoder.as_mut() {
                Some(decoder) => decoder.reset_keep_position(),
                None => self.decoder = Some(Decoder::gzip()),
            }
            self.how = How::Gzip;
            debug!(member = self.members, "gzip member detected");
            return Ok(());
        }

        if self.members > 0 {
            // Trailing bytes after the last member are ignored.
            if !pending.is_empty() {
                debug!(ignored = pending.len(), "skipping data after gzip stream");
            }
            self.in_pos = self.in_len;
            self.eof = true;
            return Ok(());
        }

        if !pending.is_empty() {
            debug!("input is not gzip, passing through");
            self.how = How::Copy;
        }
        Ok(())
    }

    /// Refill the decoded output buffer. Leaves it empty only at the end.
    fn fetch(&mut self) -> Result<()> {
        self.out_pos = 0;
        self.out_len = 0;
        loop {
            match self.how {
                How::Look => {
                    self.look()?;
                    if self.how == How::Look {
                        return Ok(());
                    }
                }
                How::Copy => {
                    if self.in_pos == self.in_len && !self.eof {
                        self.fill_input()?;
                    }
                    let n = (self.in_len - self.in_pos).min(self.output.len());
                    self.output[..n].copy_from_slice(&self.input[self.in_pos..self.in_pos + n]);
                    self.in_pos += n;
                    self.out_len = n;
                    return Ok(());
                }
                How::Gzip => {
                    if self.decode()? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Decode into the output buffer. Returns false at the end of a member
    /// with nothing produced.
    fn decode(&mut self) -> Result<bool> {
        loop {
            if self.in_pos == self.in_len {
                if self.eof {
                    return Err(truncated(self.start + self.raw));
                }
                self.fill_input()?;
                continue;
            }
            let Some(decoder) = self.decoder.as_mut() else {
                return Err(FlateError::stream("gzip decoder missing"));
            };
            let mut buffers =
                StreamBuffers::new(&self.input[self.in_pos..self.in_len], &mut self.output);
            let status = decoder.process(&mut buffers)?;
            self.in_pos += buffers.input_consumed();
            self.out_len = buffers.output_produced();

            match status {
                Status::StreamEnd => {
                    self.members += 1;
                    self.how = How::Look;
                    return Ok(self.out_len > 0);
                }
                Status::NeedDict => {
                    return Err(FlateError::data(
                        self.start + self.raw,
                        "unexpected dictionary request",
                    ));
                }
                Status::Ok | Status::BufError if self.out_len > 0 => return Ok(true),
                Status::Ok | Status::BufError => {
                    if self.in_pos == self.in_len && self.eof {
                        return Err(truncated(self.start + self.raw));
                    }
                }
            }
        }
    }

    /// Decompress into `buf`. Returns 0 at the end of the data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_reading()?;
        self.start_io()?;
        let result = self.read_data(buf);
        self.record(result)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(c) = self.ungot.pop() {
                buf[filled] = c;
                filled += 1;
                continue;
            }
            if self.out_pos == self.out_len {
                if self.eof && self.how != How::Gzip && self.in_pos == self.in_len {
                    self.past = true;
                    break;
                }
                if let Err(err) = self.fetch() {
                    if filled == 0 {
                        return Err(err);
                    }
                    // Deliver what was read; the error surfaces on the next call.
                    warn!(error = %err, "gzip file error");
                    self.error = Some(err);
                    break;
                }
                if self.out_len == 0 {
                    self.past = true;
                    break;
                }
            }
            let n = (self.out_len - self.out_pos).min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.output[self.out_pos..self.out_pos + n]);
            self.out_pos += n;
            filled += n;
        }
        self.position += filled as u64;
        Ok(filled)
    }

    /// Read one byte, or `None` at the end.
    pub fn getc(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((self.read(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Push one byte back so the next read returns it.
    pub fn ungetc(&mut self, c: u8) -> Result<()> {
        self.check_reading()?;
        self.start_io()?;
        if self.position == 0 {
            return Err(FlateError::stream("cannot push back before the start"));
        }
        if self.ungot.len() >= self.buffer_size * 2 {
            return Err(FlateError::stream("out of room to push characters"));
        }
        self.ungot.push(c);
        self.position -= 1;
        self.past = false;
        Ok(())
    }

    /// Read a line of at most `limit` bytes, keeping the newline.
    ///
    /// Returns `None` at the end of the data.
    pub fn gets(&mut self, limit: usize) -> Result<Option<Vec<u8>>> {
        self.check_reading()?;
        self.start_io()?;
        let mut line = Vec::new();
        while line.len() < limit {
            if let Some(c) = self.ungot.pop() {
                self.position += 1;
                line.push(c);
                if c == b'\n' {
                    break;
                }
                continue;
            }
            if self.out_pos == self.out_len {
                if let Err(err) = self.fetch() {
                    warn!(error = %err, "gzip file error");
                    self.error = Some(err.clone());
                    if line.is_empty() {
                        return Err(err);
                    }
                    break;
                }
                if self.out_len == 0 {
                    self.past = true;
                    break;
                }
            }
            let avail = &self.output[self.out_pos..self.out_len];
            let take = avail.len().min(limit - line.len());
            let (n, newline) = match avail[..take].iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (take, false),
            };
            line.extend_from_slice(&avail[..n]);
            self.out_pos += n;
            self.position += n as u64;
            if newline {
                break;
            }
        }
        Ok((!line.is_empty()).then_some(line))
    }

    /// Move the uncompressed position. Reading only.
    ///
    /// Seeking backwards re-reads from the start of the file; seeking
    /// forwards decodes and discards. `SeekFrom::End` is not supported.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_open()?;
        if self.mode.is_write() {
            return Err(FlateError::stream("seek is only supported when reading"));
        }
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let target = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(delta) => self
                .position
                .checked_add_signed(delta)
                .ok_or_else(|| FlateError::stream("seek before the start"))?,
            SeekFrom::End(_) => {
                return Err(FlateError::stream("cannot seek from the end of a gzip file"));
            }
        };
        self.start_io()?;
        let result = self.seek_to(target);
        self.record(result)
    }

    fn seek_to(&mut self, target: u64) -> Result<u64> {
        if self.how == How::Copy {
            // Plain data: seek the stream itself.
            let raw = self.start + target;
            self.stream()?.seek(SeekFrom::Start(raw))?;
            self.clear_read_buffers();
            self.raw = target;
            self.position = target;
            self.eof = false;
            self.past = false;
            return Ok(target);
        }

        if target < self.position {
            let start = self.start;
            self.stream()?.seek(SeekFrom::Start(start))?;
            self.clear_read_buffers();
            self.how = How::Look;
            self.decoder = None;
            self.members = 0;
            self.raw = 0;
            self.position = 0;
            self.eof = false;
            debug!(target, "rewinding gzip file");
        }
        self.past = false;

        let mut scratch = vec![0u8; self.buffer_size];
        while self.position < target {
            let want = ((target - self.position) as usize).min(scratch.len());
            if self.read_data(&mut scratch[..want])? == 0 {
                break;
            }
        }
        Ok(self.position)
    }

    fn clear_read_buffers(&mut self) {
        self.in_pos = 0;
        self.in_len = 0;
        self.out_pos = 0;
        self.out_len = 0;
        self.ungot.clear();
    }

    // ---- closing ----

    /// Finish any pending member, flush and release everything.
    ///
    /// Resources are released even when this fails; any later call reports a
    /// stream error.
    pub fn close(&mut self) -> Result<()> {
        self.shutdown().1
    }

    /// Close and hand back the underlying stream.
    pub fn finish(mut self) -> Result<S> {
        let (stream, result) = self.shutdown();
        result?;
        stream.ok_or_else(|| FlateError::stream("gzip file is closed"))
    }

    fn shutdown(&mut self) -> (Option<S>, Result<()>) {
        if self.stream.is_none() {
            return (None, Err(FlateError::stream("gzip file is already closed")));
        }
        let result = if !self.mode.is_write() {
            Ok(())
        } else if let Some(err) = &self.error {
            Err(err.clone())
        } else {
            self.start_io()
                .and_then(|()| self.flush_data(FlushMode::Finish))
        };
        debug!(position = self.position, raw = self.raw, "gzip file closed");

        self.encoder = None;
        self.decoder = None;
        self.input = Vec::new();
        self.output = Vec::new();
        self.ungot = Vec::new();
        self.in_pos = 0;
        self.in_len = 0;
        self.out_pos = 0;
        self.out_len = 0;
        (self.stream.take(), result)
    }
}

impl<S: Read + Write + Seek> Drop for GzFile<S> {
    fn drop(&mut self) {
        if self.stream.is_some() {
            if let Err(err) = self.close() {
                warn!(error = %err, "error closing gzip file on drop");
            }
        }
    }
}

impl<S: Read + Write + Seek> Read for GzFile<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        GzFile::read(self, buf).map_err(io::Error::from)
    }
}

impl<S: Read + Write + Seek> Write for GzFile<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        GzFile::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        GzFile::flush(self, FlushMode::None).map_err(io::Error::from)
    }
}

impl<S: Read + Write + Seek> Seek for GzFile<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        GzFile::seek(self, pos).map_err(io::Error::from)
    }
}
