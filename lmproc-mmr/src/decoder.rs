//! List-mode stream decoder.

use crate::event::{EventKind, EventRecord, WORD_SIZE};
use lmproc_core::{Error, MalformedReason, Result};
use rayon::prelude::*;

/// Read the little-endian word at `offset`.
#[inline]
pub(crate) fn read_word(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Check that the stream holds a whole number of words.
///
/// # Errors
/// Returns [`Error::MalformedRecord`] pointing at the trailing partial word.
pub fn check_alignment(data: &[u8]) -> Result<()> {
    let remainder = data.len() % WORD_SIZE;
    if remainder == 0 {
        return Ok(());
    }
    let offset = data.len() - remainder;
    let mut bytes = [0u8; WORD_SIZE];
    bytes[..remainder].copy_from_slice(&data[offset..]);
    Err(Error::malformed(
        offset,
        u32::from_le_bytes(bytes),
        MalformedReason::TruncatedWord,
    ))
}

/// Lazy decoder over a byte stream.
///
/// Yields `(byte offset, raw word, record)`. Decoding stops after the first
/// error; the decoder can only be restarted from the beginning.
#[derive(Debug, Clone)]
pub struct EventDecoder<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
    failed: bool,
}

impl<'a> EventDecoder<'a> {
    /// Decoder over the whole stream.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_range(data, 0, data.len())
    }

    /// Decoder over `data[start..end]`. Offsets stay absolute.
    #[must_use]
    pub fn with_range(data: &'a [u8], start: usize, end: usize) -> Self {
        Self {
            data,
            offset: start,
            end: end.min(data.len()),
            failed: false,
        }
    }

    /// Byte offset of the next record.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for EventDecoder<'_> {
    type Item = Result<(usize, u32, EventRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end {
            return None;
        }
        let offset = self.offset;
        if offset + WORD_SIZE > self.end {
            self.failed = true;
            return check_alignment(&self.data[..self.end]).err().map(Err);
        }
        self.offset += WORD_SIZE;
        let word = read_word(self.data, offset);
        match EventRecord::decode(word) {
            Some(record) => Some(Ok((offset, word, record))),
            None => {
                self.failed = true;
                Some(Err(Error::malformed(
                    offset,
                    word,
                    MalformedReason::UnknownKind,
                )))
            }
        }
    }
}

/// Record census of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Words in the stream.
    pub words: u64,
    /// Prompt coincidences.
    pub prompts: u64,
    /// Delayed coincidences.
    pub delayeds: u64,
    /// Time tags.
    pub time_tags: u64,
    /// Bucket singles records.
    pub buckets: u64,
    /// Sum of all bucket deltas.
    pub singles: u64,
    /// Gantry position tags.
    pub gantry_tags: u64,
    /// Patient monitoring tags.
    pub monitor_tags: u64,
    /// Control tags.
    pub control_tags: u64,
    /// Sum of all time-tag increments.
    pub elapsed_ms: u64,
}

impl StreamSummary {
    /// Default number of words per parallel census chunk.
    pub const CHUNK_WORDS: usize = 1 << 20;

    /// Count every record kind in the stream.
    ///
    /// Counts do not depend on record order, so chunks are scanned in
    /// parallel. The error reported is the one at the lowest offset.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRecord`] for a truncated stream or an
    /// unknown record kind.
    pub fn scan(data: &[u8]) -> Result<Self> {
        check_alignment(data)?;
        let chunk_bytes = Self::CHUNK_WORDS * WORD_SIZE;

        let partials: Vec<Result<StreamSummary>> = data
            .par_chunks(chunk_bytes)
            .enumerate()
            .map(|(index, chunk)| Self::scan_chunk(chunk, index * chunk_bytes))
            .collect();

        let mut summary = StreamSummary::default();
        for partial in partials {
            summary.merge(&partial?);
        }
        Ok(summary)
    }

    fn scan_chunk(chunk: &[u8], base: usize) -> Result<Self> {
        let mut summary = StreamSummary::default();
        for (i, bytes) in chunk.chunks_exact(WORD_SIZE).enumerate() {
            let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            let record = EventRecord::decode(word).ok_or_else(|| {
                Error::malformed(base + i * WORD_SIZE, word, MalformedReason::UnknownKind)
            })?;
            summary.count(&record);
        }
        Ok(summary)
    }

    /// Add one record to the census.
    pub fn count(&mut self, record: &EventRecord) {
        self.words += 1;
        match *record {
            EventRecord::PromptCoincidence { .. } => self.prompts += 1,
            EventRecord::DelayedCoincidence { .. } => self.delayeds += 1,
            EventRecord::TimeTag { increment_ms } => {
                self.time_tags += 1;
                self.elapsed_ms += u64::from(increment_ms);
            }
            EventRecord::Bucket { delta, .. } => {
                self.buckets += 1;
                self.singles += u64::from(delta);
            }
            EventRecord::GantryOrMotion { .. } => match record.kind() {
                EventKind::Gantry => self.gantry_tags += 1,
                _ => self.monitor_tags += 1,
            },
            EventRecord::Control { .. } => self.control_tags += 1,
        }
    }

    /// Add another census to this one.
    pub fn merge(&mut self, other: &StreamSummary) {
        self.words += other.words;
        self.prompts += other.prompts;
        self.delayeds += other.delayeds;
        self.time_tags += other.time_tags;
        self.buckets += other.buckets;
        self.singles += other.singles;
        self.gantry_tags += other.gantry_tags;
        self.monitor_tags += other.monitor_tags;
        self.control_tags += other.control_tags;
        self.elapsed_ms += other.elapsed_ms;
    }

    /// Coincidences of either kind.
    #[must_use]
    pub fn coincidences(&self) -> u64 {
        self.prompts + self.delayeds
    }
}
