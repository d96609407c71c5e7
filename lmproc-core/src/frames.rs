//! Frame schedules for dynamic studies.
//!
//! A dynamic acquisition is histogrammed as a sequence of consecutive
//! windows. The schedule is written as groups of `count x duration_ms`
//! (`"4x15000,8x30000"` is four 15 s frames followed by eight 30 s frames)
//! laid end to end from a start time.

use crate::{Error, Result, TimeWindow};

/// Ordered list of frame windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSchedule {
    windows: Vec<TimeWindow>,
}

impl FrameSchedule {
    /// Lays `(count, duration_ms)` groups end to end from `start_ms`.
    ///
    /// # Errors
    /// - [`Error::ConfigError`] for an empty schedule, a group with no frames,
    ///   or frame bounds past `i64::MAX`
    /// - [`Error::InvalidWindow`] for a negative start or a non-positive duration
    pub fn from_definition(start_ms: i64, groups: &[(usize, i64)]) -> Result<Self> {
        let mut windows = Vec::new();
        let mut t0 = start_ms;
        for &(count, duration_ms) in groups {
            if count == 0 {
                return Err(Error::ConfigError(format!(
                    "frame group of {duration_ms} ms has no frames"
                )));
            }
            for _ in 0..count {
                let t1 = t0.checked_add(duration_ms).ok_or_else(|| {
                    Error::ConfigError(format!("frame starting at {t0} ms overflows"))
                })?;
                windows.push(TimeWindow::new(t0, t1)?);
                t0 = t1;
            }
        }
        Self::from_windows(windows)
    }

    /// Explicit `[tstart, tstop)` pairs, in the order given.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for an empty list and
    /// [`Error::InvalidWindow`] for an invalid pair.
    pub fn from_timings(timings: &[(i64, i64)]) -> Result<Self> {
        let windows = timings
            .iter()
            .map(|&(tstart, tstop)| TimeWindow::new(tstart, tstop))
            .collect::<Result<Vec<_>>>()?;
        Self::from_windows(windows)
    }

    /// Parses a `count x duration_ms` list such as `"4x15000,8x30000"`.
    ///
    /// A bare duration is a single frame.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for unparsable groups, plus the errors
    /// of [`FrameSchedule::from_definition`].
    pub fn parse(definition: &str, start_ms: i64) -> Result<Self> {
        let groups = definition
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(parse_group)
            .collect::<Result<Vec<_>>>()?;
        Self::from_definition(start_ms, &groups)
    }

    fn from_windows(windows: Vec<TimeWindow>) -> Result<Self> {
        if windows.is_empty() {
            return Err(Error::ConfigError("frame schedule has no frames".into()));
        }
        Ok(Self { windows })
    }

    /// Frame windows in order.
    #[must_use]
    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Always false for a constructed schedule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

fn parse_group(item: &str) -> Result<(usize, i64)> {
    let invalid = || Error::ConfigError(format!("invalid frame group `{item}`, expected COUNTxMS"));
    match item.split_once('x') {
        Some((count, duration)) => {
            let count = count.trim().parse().map_err(|_| invalid())?;
            let duration = duration.trim().parse().map_err(|_| invalid())?;
            Ok((count, duration))
        }
        None => Ok((1, item.parse().map_err(|_| invalid())?)),
    }
}
