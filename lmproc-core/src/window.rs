//! Time window and running clock.
//!
//! The stream carries no absolute timestamps. Elapsed time is rebuilt from
//! time-tag records: a tag carrying `+d` ms opens the interval
//! `[elapsed, elapsed + d)` and every record that follows it, up to the next
//! tag, is dated at the start of that interval.

use crate::{Error, Result};

/// Half-open acquisition window `[tstart, tstop)` in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    tstart: u64,
    tstop: u64,
}

impl TimeWindow {
    /// Creates a window, checking `0 <= tstart < tstop`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidWindow`] for a negative start or an empty or
    /// inverted window.
    pub fn new(tstart: i64, tstop: i64) -> Result<Self> {
        match (u64::try_from(tstart), u64::try_from(tstop)) {
            (Ok(start), Ok(stop)) if start < stop => Ok(Self {
                tstart: start,
                tstop: stop,
            }),
            _ => Err(Error::InvalidWindow { tstart, tstop }),
        }
    }

    /// Window start (inclusive).
    #[must_use]
    pub fn tstart(&self) -> u64 {
        self.tstart
    }

    /// Window stop (exclusive).
    #[must_use]
    pub fn tstop(&self) -> u64 {
        self.tstop
    }

    /// Window length in milliseconds.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.tstop - self.tstart
    }

    /// Returns true if `time` lies in `[tstart, tstop)`.
    #[inline]
    #[must_use]
    pub fn contains(&self, time: u64) -> bool {
        self.tstart <= time && time < self.tstop
    }

    /// Number of head-curve slots: `ceil(duration / period)`.
    #[must_use]
    pub fn slot_count(&self, tag_period_ms: u32) -> usize {
        let slots = self.duration().div_ceil(u64::from(tag_period_ms));
        usize::try_from(slots).unwrap_or(usize::MAX)
    }

    /// Head-curve slot of an in-window time.
    #[inline]
    #[must_use]
    pub fn slot(&self, time: u64, tag_period_ms: u32) -> usize {
        debug_assert!(self.contains(time));
        // In-window times are below tstop, so the quotient fits the slot count.
        ((time - self.tstart) / u64::from(tag_period_ms)) as usize
    }

    /// Slot of the record currently being read, or `None` if the clock has
    /// not started or lies outside the window.
    #[inline]
    #[must_use]
    pub fn admit(&self, clock: &ClockState, tag_period_ms: u32) -> Option<usize> {
        clock
            .event_time()
            .filter(|&time| self.contains(time))
            .map(|time| self.slot(time, tag_period_ms))
    }
}

/// Running clock rebuilt from time tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockState {
    elapsed_ms: u64,
    interval_start: Option<u64>,
    tags: u64,
}

impl ClockState {
    /// A clock at the start of a stream: no time tag seen yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a time tag and return the start of the interval it opens.
    #[inline]
    pub fn advance(&mut self, increment_ms: u32) -> u64 {
        let start = self.elapsed_ms;
        self.interval_start = Some(start);
        self.elapsed_ms += u64::from(increment_ms);
        self.tags += 1;
        start
    }

    /// Time of records following the latest tag.
    #[inline]
    #[must_use]
    pub fn event_time(&self) -> Option<u64> {
        self.interval_start
    }

    /// Total elapsed time, end of the current interval.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Number of time tags applied so far.
    #[must_use]
    pub fn tags_seen(&self) -> u64 {
        self.tags
    }
}
