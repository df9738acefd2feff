//! LZ77 match finding for DEFLATE.
//!
//! The matcher owns a sliding window of `2 * window_size` bytes. Input is
//! appended at the end; when the cursor gets close to the end of the buffer,
//! the upper half is moved down and every stored position is rebased.
//!
//! # Algorithm
//!
//! Positions are hashed on their first three bytes. `head` holds the most
//! recent position for each hash, and `prev` links each position to the
//! previous one with the same hash. For each position the chain is walked
//! (up to the level's chain limit) for the longest match. Levels 4 and up
//! look one byte ahead before committing to a match (lazy matching).

use crate::config::Strategy;
use oxiflate_core::error::{FlateError, Result};

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Lookahead kept in the window before a match search is attempted.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH + MIN_MATCH + 1;

/// Matches of length 3 further back than this are not worth coding.
const TOO_FAR: usize = 4096;

/// Empty hash slot.
const NIL: u32 = u32::MAX;

/// A token produced by LZ77 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

impl Token {
    /// Number of input bytes the token covers.
    pub fn span(&self) -> usize {
        match *self {
            Token::Literal(_) => 1,
            Token::Match { length, .. } => length as usize,
        }
    }
}

/// Search parameters for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchParams {
    /// Shorten the chain search once a match this long is found.
    pub good_length: u16,
    /// Skip the lazy lookahead for matches at least this long.
    pub max_lazy: u16,
    /// Stop searching once a match this long is found.
    pub nice_length: u16,
    /// Maximum hash chain positions examined per search.
    pub max_chain: u16,
}

impl MatchParams {
    /// Parameters for a level (0-9), following zlib's configuration table.
    pub fn for_level(level: u8) -> Self {
        let (good_length, max_lazy, nice_length, max_chain) = match level {
            0 => (0, 0, 0, 0),
            1 => (4, 4, 8, 4),
            2 => (4, 5, 16, 8),
            3 => (4, 6, 32, 32),
            4 => (4, 4, 16, 16),
            5 => (8, 16, 32, 32),
            6 => (8, 16, 128, 128),
            7 => (8, 32, 128, 256),
            8 => (32, 128, 258, 1024),
            _ => (32, 258, 258, 4096),
        };
        Self {
            good_length,
            max_lazy,
            nice_length,
            max_chain,
        }
    }
}

/// Allocate a zero-filled buffer, reporting failure as a memory error.
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| FlateError::mem(len * std::mem::size_of::<T>()))?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Hash-chain LZ77 matcher over a sliding window.
#[derive(Debug, Clone)]
pub struct Matcher {
    window: Vec<u8>,
    w_size: usize,
    w_mask: usize,
    head: Vec<u32>,
    prev: Vec<u32>,
    hash_shift: u32,
    /// Position of the next byte to tokenize.
    strstart: usize,
    /// Bytes buffered at and after `strstart`.
    lookahead: usize,
    /// Every position below this one has been hashed.
    ins_pos: usize,
    /// Positions below this one may not be referenced.
    history_start: usize,
    params: MatchParams,
    level: u8,
    strategy: Strategy,
}

impl Matcher {
    /// Create a matcher for a `1 << window_bits` window and a
    /// `1 << hash_bits` entry hash table.
    pub fn new(window_bits: u8, hash_bits: u32, level: u8, strategy: Strategy) -> Result<Self> {
        let w_size = 1usize << window_bits;
        Ok(Self {
            window: try_alloc(2 * w_size, 0u8)?,
            w_size,
            w_mask: w_size - 1,
            head: try_alloc(1usize << hash_bits, NIL)?,
            prev: try_alloc(w_size, NIL)?,
            hash_shift: 32 - hash_bits,
            strstart: 0,
            lookahead: 0,
            ins_pos: 0,
            history_start: 0,
            params: MatchParams::for_level(level),
            level,
            strategy,
        })
    }

    /// Forget all data and history.
    pub fn reset(&mut self) {
        self.head.fill(NIL);
        self.strstart = 0;
        self.lookahead = 0;
        self.ins_pos = 0;
        self.history_start = 0;
    }

    /// Switch level and strategy, keeping the window.
    pub fn set_level(&mut self, level: u8, strategy: Strategy) {
        self.level = level;
        self.strategy = strategy;
        self.params = MatchParams::for_level(level);
    }

    /// Override the level's search parameters.
    pub fn tune(&mut self, params: MatchParams) {
        self.params = params;
    }

    /// Current search parameters.
    pub fn params(&self) -> MatchParams {
        self.params
    }

    /// Forget match history so later output never refers back past this
    /// point.
    pub fn clear_history(&mut self) {
        self.head.fill(NIL);
        self.history_start = self.strstart;
        self.ins_pos = self.strstart;
    }

    /// Load a preset dictionary (at most one window) as history.
    pub fn set_dictionary(&mut self, bytes: &[u8]) {
        self.reset();
        let n = bytes.len().min(self.w_size);
        self.window[..n].copy_from_slice(&bytes[bytes.len() - n..]);
        self.strstart = n;
        self.insert_upto(n);
    }

    /// The last window's worth of history, including buffered lookahead.
    pub fn history(&self) -> &[u8] {
        let end = self.strstart + self.lookahead;
        let start = end - end.min(self.w_size).min(end - self.history_start.min(end));
        &self.window[start..end]
    }

    /// Buffered bytes not yet tokenized.
    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Cursor of the next byte to tokenize.
    pub fn position(&self) -> usize {
        self.strstart
    }

    /// Window bytes `[start, start + len)`.
    pub fn bytes(&self, start: usize, len: usize) -> &[u8] {
        &self.window[start..start + len]
    }

    /// Copy as much of `input` as fits into the window; returns the count.
    pub fn fill(&mut self, input: &[u8]) -> usize {
        if input.is_empty() {
            return 0;
        }
        if self.strstart >= 2 * self.w_size - MIN_LOOKAHEAD {
            self.slide();
        }
        let end = self.strstart + self.lookahead;
        let n = input.len().min(self.window.len() - end);
        self.window[end..end + n].copy_from_slice(&input[..n]);
        self.lookahead += n;
        n
    }

    /// Move the upper half of the window down and rebase stored positions.
    fn slide(&mut self) {
        let w_size = self.w_size;
        self.window.copy_within(w_size..2 * w_size, 0);
        self.strstart -= w_size;
        self.ins_pos = self.ins_pos.saturating_sub(w_size);
        self.history_start = self.history_start.saturating_sub(w_size);

        let rebase = |v: &mut u32| {
            *v = if *v != NIL && *v as usize >= w_size {
                *v - w_size as u32
            } else {
                NIL
            };
        };
        self.head.iter_mut().for_each(rebase);
        self.prev.iter_mut().for_each(rebase);
    }

    fn uses_hash(&self) -> bool {
        self.level > 0 && !matches!(self.strategy, Strategy::HuffmanOnly | Strategy::Rle)
    }

    #[inline]
    fn hash(&self, pos: usize) -> usize {
        let key = self.window[pos] as u32
            | (self.window[pos + 1] as u32) << 8
            | (self.window[pos + 2] as u32) << 16;
        (key.wrapping_mul(0x9E37_79B1) >> self.hash_shift) as usize
    }

    /// Hash every position below `limit` that has three bytes available.
    fn insert_upto(&mut self, limit: usize) {
        if !self.uses_hash() {
            self.ins_pos = self.ins_pos.max(limit);
            return;
        }
        let end = self.strstart + self.lookahead;
        while self.ins_pos < limit && self.ins_pos + MIN_MATCH <= end {
            let pos = self.ins_pos;
            let h = self.hash(pos);
            self.prev[pos & self.w_mask] = self.head[h];
            self.head[h] = pos as u32;
            self.ins_pos += 1;
        }
    }

    /// Longest usable match at `pos`, as `(length, distance)`; length 0 if
    /// none.
    fn best_match(&self, pos: usize) -> (usize, usize) {
        let avail = self.strstart + self.lookahead - pos;
        let max_len = avail.min(MAX_MATCH);
        if max_len < MIN_MATCH || self.level == 0 {
            return (0, 0);
        }

        match self.strategy {
            Strategy::HuffmanOnly => (0, 0),
            Strategy::Rle => self.run_match(pos, max_len),
            _ => {
                let (len, dist) = self.chain_match(pos, max_len);
                let too_short = self.strategy == Strategy::Filtered && len <= 5;
                if len < MIN_MATCH || too_short || (len == MIN_MATCH && dist > TOO_FAR) {
                    (0, 0)
                } else {
                    (len, dist)
                }
            }
        }
    }

    fn run_match(&self, pos: usize, max_len: usize) -> (usize, usize) {
        if pos == 0 || pos - 1 < self.history_start {
            return (0, 0);
        }
        let byte = self.window[pos - 1];
        let len = self.window[pos..pos + max_len]
            .iter()
            .take_while(|&&b| b == byte)
            .count();
        if len >= MIN_MATCH { (len, 1) } else { (0, 0) }
    }

    fn chain_match(&self, pos: usize, max_len: usize) -> (usize, usize) {
        let max_dist = self.w_size - MIN_LOOKAHEAD;
        let limit = pos.saturating_sub(max_dist).max(self.history_start);
        let nice = (self.params.nice_length as usize).min(max_len);
        let mut chain = self.params.max_chain as usize;

        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0;
        let mut cand = self.head[self.hash(pos)];

        while cand != NIL && chain > 0 {
            let c = cand as usize;
            if c < limit || c >= pos {
                break;
            }
            if self.window[c + best_len] == self.window[pos + best_len] {
                let len = self.window[c..c + max_len]
                    .iter()
                    .zip(&self.window[pos..pos + max_len])
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    best_len = len;
                    best_dist = pos - c;
                    if len >= nice {
                        break;
                    }
                    if len >= self.params.good_length as usize {
                        chain = chain.min((self.params.max_chain as usize >> 2).max(1));
                    }
                }
            }
            let next = self.prev[c & self.w_mask];
            if next == NIL || next >= cand {
                break;
            }
            cand = next;
            chain -= 1;
        }

        if best_dist == 0 { (0, 0) } else { (best_len, best_dist) }
    }

    /// Produce the next token, advancing the cursor past it.
    ///
    /// Returns `None` when more input is needed: the lookahead is empty, or
    /// (unless `flushing`) too short for a full-length match search.
    pub fn next_token(&mut self, flushing: bool) -> Option<Token> {
        if self.lookahead == 0 || (!flushing && self.lookahead < MIN_LOOKAHEAD) {
            return None;
        }
        let pos = self.strstart;
        self.insert_upto(pos);
        let (len, dist) = self.best_match(pos);

        let mut token = Token::Literal(self.window[pos]);
        if len >= MIN_MATCH {
            let lazy = self.level >= 4 && len < self.params.max_lazy as usize && len < self.lookahead;
            let better_next = lazy && {
                self.insert_upto(pos + 1);
                self.best_match(pos + 1).0 > len
            };
            if !better_next {
                token = Token::Match {
                    length: len as u16,
                    distance: dist as u16,
                };
            }
        }

        let span = token.span();
        self.strstart += span;
        self.lookahead -= span;
        Some(token)
    }
}
