//! Chunk-aware list-mode processing.

use crate::accumulator::{Accumulator, Binning};
use crate::decoder::{read_word, EventDecoder};
use crate::event::{time_tag_increment, EventKind, EventRecord, WORD_SIZE};
use lmproc_core::{ClockState, Counters, Error, MalformedReason, Result, TimeWindow};

/// A contiguous run of words processed by one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamChunk {
    /// Byte offset of chunk start.
    pub start_offset: usize,
    /// Byte offset of chunk end.
    pub end_offset: usize,
    /// Clock state at chunk start (inherited from the words before it).
    pub clock: ClockState,
}

impl StreamChunk {
    /// The whole stream as a single chunk with a fresh clock.
    #[must_use]
    pub fn whole(data: &[u8]) -> Self {
        Self {
            start_offset: 0,
            end_offset: data.len(),
            clock: ClockState::new(),
        }
    }

    /// Number of bytes in this chunk.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Number of 32-bit words in this chunk.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.byte_size() / WORD_SIZE
    }
}

/// Result of the pre-scan: the in-window region split into chunks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Chunks covering the region from the first in-window tag to the close.
    pub chunks: Vec<StreamChunk>,
    /// Highest head-curve slot opened by a tag, plus one.
    pub slots_observed: usize,
    /// Words inspected, including the tag that closed the window.
    pub words_scanned: u64,
    /// True if a tag reached `tstop` before the end of the stream.
    pub closed: bool,
}

/// Pre-scan a stream and split its in-window region into chunks.
///
/// Only the tag bits of each word are inspected:
/// 1. Validate record kinds up to the window close
/// 2. Locate the first tag inside the window and the tag reaching `tstop`
/// 3. Replay the time tags of the region to seed each chunk's clock
///
/// # Arguments
/// * `data` - Whole stream, word aligned
/// * `window` - Acquisition window
/// * `tag_period_ms` - Head-curve slot duration
/// * `target_chunks` - Desired number of chunks (at least 1)
///
/// # Errors
/// Returns [`Error::MalformedRecord`] for an unknown record kind before
/// the window closes.
pub fn plan_chunks(
    data: &[u8],
    window: &TimeWindow,
    tag_period_ms: u32,
    target_chunks: usize,
) -> Result<ChunkPlan> {
    let mut plan = ChunkPlan::default();
    let mut clock = ClockState::new();
    let mut open: Option<(usize, ClockState)> = None;
    let mut close = data.len() - data.len() % WORD_SIZE;

    // Phase 1: find the region and validate kinds
    let mut offset = 0;
    while offset + WORD_SIZE <= data.len() {
        let word = read_word(data, offset);
        plan.words_scanned += 1;
        match EventKind::classify(word) {
            None => {
                return Err(Error::malformed(
                    offset,
                    word,
                    MalformedReason::UnknownKind,
                ))
            }
            Some(EventKind::TimeTag) => {
                let before = clock;
                let start = clock.advance(time_tag_increment(word).unwrap_or_default());
                if start >= window.tstop() {
                    close = offset;
                    plan.closed = true;
                    break;
                }
                if window.contains(start) {
                    if open.is_none() {
                        open = Some((offset, before));
                    }
                    plan.slots_observed = window.slot(start, tag_period_ms) + 1;
                }
            }
            Some(_) => {}
        }
        offset += WORD_SIZE;
    }

    let Some((open_offset, open_clock)) = open else {
        return Ok(plan);
    };

    // Phase 2: cut the region and inherit clocks across boundaries
    let region_words = (close - open_offset) / WORD_SIZE;
    let chunk_bytes = region_words.div_ceil(target_chunks.max(1)).max(1) * WORD_SIZE;

    let mut chunk_start = open_offset;
    let mut chunk_clock = open_clock;
    let mut clock = open_clock;
    let mut offset = open_offset;
    while offset < close {
        if offset - chunk_start == chunk_bytes {
            plan.chunks.push(StreamChunk {
                start_offset: chunk_start,
                end_offset: offset,
                clock: chunk_clock,
            });
            chunk_start = offset;
            chunk_clock = clock;
        }
        if let Some(increment) = time_tag_increment(read_word(data, offset)) {
            clock.advance(increment);
        }
        offset += WORD_SIZE;
    }
    if close > chunk_start {
        plan.chunks.push(StreamChunk {
            start_offset: chunk_start,
            end_offset: close,
            clock: chunk_clock,
        });
    }

    Ok(plan)
}

/// Per-chunk bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// Words decoded.
    pub decoded: u64,
    /// Coincidence and singles records inside the window.
    pub admitted: u64,
    /// Coincidences outside the axial acceptance.
    pub excluded: u64,
    /// Highest slot opened by a tag in this chunk, plus one.
    pub slots_observed: usize,
    /// True if a tag reached `tstop` in this chunk.
    pub closed: bool,
}

impl ChunkStats {
    /// Combine the bookkeeping of two chunks.
    pub fn merge(&mut self, other: &ChunkStats) {
        self.decoded += other.decoded;
        self.admitted += other.admitted;
        self.excluded += other.excluded;
        self.slots_observed = self.slots_observed.max(other.slots_observed);
        self.closed |= other.closed;
    }
}

/// Decode and accumulate a single chunk.
///
/// This is designed to be called in parallel for different chunks, each
/// with its own counters. Processing stops at the first tag whose interval
/// starts at or after `tstop`.
///
/// # Errors
/// Returns [`Error::MalformedRecord`] for an unknown record kind, or an
/// admitted record that does not resolve through the geometry tables.
pub fn process_chunk(
    data: &[u8],
    chunk: &StreamChunk,
    acc: &Accumulator<'_>,
    counters: &mut Counters<'_>,
) -> Result<ChunkStats> {
    let window = acc.window();
    let period = acc.tag_period_ms();
    let mut stats = ChunkStats::default();
    let mut clock = chunk.clock;
    let mut slot = window.admit(&clock, period);

    for item in EventDecoder::with_range(data, chunk.start_offset, chunk.end_offset) {
        let (offset, word, record) = item?;
        stats.decoded += 1;

        match record {
            EventRecord::TimeTag { increment_ms } => {
                if clock.advance(increment_ms) >= window.tstop() {
                    stats.closed = true;
                    break;
                }
                slot = window.admit(&clock, period);
                if let Some(slot) = slot {
                    stats.slots_observed = stats.slots_observed.max(slot + 1);
                }
            }
            EventRecord::PromptCoincidence { lor } | EventRecord::DelayedCoincidence { lor } => {
                // Records before tstart only keep the clock moving.
                let Some(slot) = slot else { continue };
                stats.admitted += 1;
                let prompt = matches!(record, EventRecord::PromptCoincidence { .. });
                if acc.coincidence(offset, word, lor, prompt, slot, counters)? == Binning::Excluded
                {
                    stats.excluded += 1;
                }
            }
            EventRecord::Bucket { bucket, delta } => {
                if slot.is_none() {
                    continue;
                }
                stats.admitted += 1;
                acc.bucket(offset, word, bucket, delta, counters)?;
            }
            EventRecord::GantryOrMotion { .. } | EventRecord::Control { .. } => {}
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(increment_ms: u32) -> u32 {
        EventRecord::TimeTag { increment_ms }.encode()
    }

    fn prompt(lor: u32) -> u32 {
        EventRecord::PromptCoincidence { lor }.encode()
    }

    fn bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_plan_skips_words_before_window() {
        // [0,1000) [1000,2000) [2000,3000) [3000,..)
        let data = bytes(&[
            tag(1000),
            prompt(0),
            tag(1000),
            prompt(0),
            tag(1000),
            prompt(0),
            tag(1000),
            prompt(0),
        ]);
        let window = TimeWindow::new(1000, 3000).unwrap();
        let plan = plan_chunks(&data, &window, 1000, 1).unwrap();

        assert!(plan.closed);
        assert_eq!(plan.slots_observed, 2);
        assert_eq!(plan.words_scanned, 7);
        assert_eq!(plan.chunks.len(), 1);
        assert_eq!(plan.chunks[0].start_offset, 8); // second tag
        assert_eq!(plan.chunks[0].end_offset, 24); // closing tag excluded
        assert_eq!(plan.chunks[0].clock.elapsed_ms(), 1000);
    }

    #[test]
    fn test_plan_inherits_clock() {
        let data = bytes(&[tag(10), prompt(0), prompt(0), tag(10), prompt(0), prompt(0)]);
        let window = TimeWindow::new(0, 100).unwrap();
        let plan = plan_chunks(&data, &window, 10, 2).unwrap();

        assert!(!plan.closed);
        assert_eq!(plan.chunks.len(), 2);
        assert_eq!(plan.chunks[0].start_offset, 0);
        assert_eq!(plan.chunks[0].word_count(), 3);
        assert_eq!(plan.chunks[1].start_offset, 12);
        // Second chunk starts after one tag
        assert_eq!(plan.chunks[1].clock.tags_seen(), 1);
        assert_eq!(plan.chunks[1].clock.event_time(), Some(0));
    }

    #[test]
    fn test_plan_window_never_opens() {
        let data = bytes(&[tag(10), prompt(0)]);
        let window = TimeWindow::new(1000, 2000).unwrap();
        let plan = plan_chunks(&data, &window, 1000, 4).unwrap();
        assert!(plan.chunks.is_empty());
        assert_eq!(plan.slots_observed, 0);
    }

    #[test]
    fn test_plan_rejects_unknown_kind() {
        let data = bytes(&[tag(10), 0xB000_0000]);
        let window = TimeWindow::new(0, 2000).unwrap();
        assert!(matches!(
            plan_chunks(&data, &window, 1000, 1),
            Err(Error::MalformedRecord { offset: 4, .. })
        ));
    }

    #[test]
    fn test_plan_ignores_words_after_close() {
        let data = bytes(&[tag(10), tag(10), 0xB000_0000]);
        let window = TimeWindow::new(0, 10).unwrap();
        let plan = plan_chunks(&data, &window, 10, 1).unwrap();
        assert!(plan.closed);
        assert_eq!(plan.words_scanned, 2);
    }

    #[test]
    fn test_chunk_stats_merge() {
        let mut a = ChunkStats {
            decoded: 3,
            admitted: 2,
            excluded: 1,
            slots_observed: 1,
            closed: false,
        };
        let b = ChunkStats {
            decoded: 2,
            admitted: 1,
            excluded: 0,
            slots_observed: 4,
            closed: true,
        };
        a.merge(&b);
        assert_eq!(a.decoded, 5);
        assert_eq!(a.slots_observed, 4);
        assert!(a.closed);
    }
}
