//! lmproc-mmr: mMR list-mode decoder and histogram engine.
//!
//! # Key Components
//!
//! - [`EventRecord`] - Decoded 32-bit list-mode word
//! - [`EventDecoder`] - Lazy decoder over a byte stream
//! - [`Accumulator`] - Resolves LOR codes and increments histograms
//! - [`process_stream`] - One full histogramming pass
//!
//! # Processing Pipeline
//!
//! 1. **Phase 1 (Sequential)**: Pre-scan tags, locate the window, seed chunk clocks
//! 2. **Phase 2 (Parallel)**: Accumulate each chunk into private histograms
//! 3. **Phase 3 (Sequential)**: Sum the private histograms into the output

pub mod accumulator;
pub mod decoder;
pub mod event;
pub mod section;

pub use accumulator::{Accumulator, Binning};
pub use decoder::{check_alignment, EventDecoder, StreamSummary};
pub use event::{time_tag_increment, EventKind, EventRecord, MotionTag, WORD_SIZE};
pub use section::{plan_chunks, process_chunk, ChunkPlan, ChunkStats, StreamChunk};

use lmproc_core::{
    AxialLut, CentroidSums, Error, HistogramOutput, HistogramShape, HistogramSummary, Histograms,
    LorBinMap, Result, ScannerConstants, TimeWindow,
};
use rayon::prelude::*;
use sysinfo::System;

/// Configuration of a histogramming pass.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Split the stream across worker threads.
    pub parallel: bool,
    /// Worker thread cap. Defaults to the rayon pool size.
    pub parallelism: Option<usize>,
    /// Smallest chunk worth handing to a worker, in words.
    pub min_chunk_words: usize,
    /// Fraction of available system memory workers may use (0.0 < fraction <= 1.0).
    pub memory_fraction: f64,
    /// Explicit memory budget override (bytes). If set, `memory_fraction` is ignored.
    pub memory_budget_bytes: Option<usize>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallelism: None,
            min_chunk_words: 1 << 20,
            memory_fraction: 0.5,
            memory_budget_bytes: None,
        }
    }
}

impl ProcessorConfig {
    /// Configuration for a single-threaded pass.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Set the worker thread cap. Values less than 1 are clamped to 1.
    #[must_use]
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads.max(1));
        self
    }

    /// Set the smallest chunk size in words. Values less than 1 are clamped to 1.
    #[must_use]
    pub fn with_min_chunk_words(mut self, words: usize) -> Self {
        self.min_chunk_words = words.max(1);
        self
    }

    /// Set the fraction of available system memory to target.
    #[must_use]
    pub fn with_memory_fraction(mut self, fraction: f64) -> Self {
        self.memory_fraction = fraction;
        self
    }

    /// Set an explicit memory budget in bytes.
    #[must_use]
    pub fn with_memory_budget_bytes(mut self, bytes: usize) -> Self {
        self.memory_budget_bytes = Some(bytes);
        self
    }

    /// Resolve the memory budget for worker scratch in bytes.
    ///
    /// # Errors
    /// Returns an error if the memory fraction is invalid or system memory cannot be queried.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn resolve_budget_bytes(&self) -> Result<usize> {
        if let Some(bytes) = self.memory_budget_bytes {
            return Ok(bytes);
        }
        if !(0.0 < self.memory_fraction && self.memory_fraction <= 1.0) {
            return Err(Error::ConfigError(
                "memory_fraction must be in (0.0, 1.0]".to_string(),
            ));
        }
        let mut system = System::new();
        system.refresh_memory();
        let available = system.available_memory();
        if available == 0 {
            return Err(Error::ConfigError(
                "available system memory reported as 0".to_string(),
            ));
        }
        let budget = (available as f64 * self.memory_fraction).floor() as u64;
        Ok(usize::try_from(budget).unwrap_or(usize::MAX))
    }

    /// Number of workers for a stream of `words` words, each needing
    /// `scratch_bytes` of private histograms.
    ///
    /// # Errors
    /// Returns an error if the memory budget cannot be resolved.
    pub fn plan_workers(&self, words: usize, scratch_bytes: usize) -> Result<usize> {
        if !self.parallel {
            return Ok(1);
        }
        let threads = self
            .parallelism
            .unwrap_or_else(rayon::current_num_threads)
            .max(1);
        let by_size = words / self.min_chunk_words.max(1);
        if threads.min(by_size) <= 1 {
            return Ok(1);
        }
        let by_memory = self.resolve_budget_bytes()? / scratch_bytes.max(1);
        Ok(threads.min(by_size).min(by_memory).max(1))
    }
}

/// Decode a list-mode stream and histogram the records inside `window`.
///
/// The output buffers are zeroed first, so a pass never accumulates onto
/// a previous one. On error the buffer contents are unspecified.
///
/// # Errors
/// - [`Error::ConfigError`] for inconsistent constants or tables
/// - [`Error::SizeMismatch`] if an output buffer has the wrong length
/// - [`Error::MalformedRecord`] for a truncated or undecodable stream
pub fn process_stream(
    data: &[u8],
    window: &TimeWindow,
    lor_map: &LorBinMap,
    axial: &AxialLut,
    constants: &ScannerConstants,
    out: &mut HistogramOutput<'_>,
    config: &ProcessorConfig,
) -> Result<HistogramSummary> {
    constants.validate()?;
    lor_map.validate(constants)?;
    axial.validate(constants)?;

    let shape = HistogramShape::new(constants, window);
    out.check_shape(&shape)?;
    check_alignment(data)?;
    out.reset();

    let acc = Accumulator::new(lor_map, axial, constants, *window);
    let words = data.len() / WORD_SIZE;
    let workers = config.plan_workers(words, shape.scratch_bytes())?;
    log::debug!(
        "processing {words} words in [{}, {}) ms with {workers} worker(s)",
        window.tstart(),
        window.tstop()
    );

    let mut centroid = CentroidSums::new(shape.slots);
    let (stats, chunks) = if workers <= 1 {
        let chunk = StreamChunk::whole(data);
        let stats = process_chunk(data, &chunk, &acc, &mut out.counters(&mut centroid))?;
        (stats, 1)
    } else {
        let plan = plan_chunks(data, window, constants.tag_period_ms, workers)?;
        log::debug!(
            "planned {} chunk(s) after scanning {} words",
            plan.chunks.len(),
            plan.words_scanned
        );

        let partials: Vec<Result<(Histograms, ChunkStats)>> = plan
            .chunks
            .par_iter()
            .map(|chunk| {
                let mut hist = Histograms::zeroed(&shape);
                let stats = process_chunk(data, chunk, &acc, &mut hist.counters())?;
                Ok((hist, stats))
            })
            .collect();

        // Words before the region are only clock updates.
        let mut stats = ChunkStats {
            decoded: plan.words_scanned
                - plan.chunks.iter().map(|c| c.word_count() as u64).sum::<u64>(),
            slots_observed: plan.slots_observed,
            closed: plan.closed,
            ..ChunkStats::default()
        };
        for partial in partials {
            let (hist, chunk_stats) = partial?;
            hist.add_into(out, &mut centroid);
            stats.merge(&chunk_stats);
        }
        (stats, plan.chunks.len())
    };

    if stats.slots_observed == 0 {
        log::warn!(
            "no time tag opened an interval inside [{}, {}) ms",
            window.tstart(),
            window.tstop()
        );
    }
    if !stats.closed {
        log::info!(
            "stream ended before tstop ({} ms), {} of {} slot(s) opened",
            window.tstop(),
            stats.slots_observed,
            shape.slots
        );
    }
    out.assemble(&centroid, stats.slots_observed);
    let summary = HistogramSummary {
        records_decoded: stats.decoded,
        events_admitted: stats.admitted,
        events_excluded: stats.excluded,
        chunks,
        window_closed: stats.closed,
        ..out.summary()
    };
    log::info!(
        "histogrammed {} prompts, {} delayeds over {} interval(s)",
        summary.psm,
        summary.dsm,
        summary.nitag
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_plans_one_worker() {
        let config = ProcessorConfig::sequential();
        assert_eq!(config.plan_workers(1 << 30, 1).unwrap(), 1);
    }

    #[test]
    fn test_small_stream_stays_sequential() {
        let config = ProcessorConfig::default().with_parallelism(8);
        assert_eq!(config.plan_workers(1000, 1).unwrap(), 1);
    }

    #[test]
    fn test_workers_bounded_by_memory() {
        let config = ProcessorConfig::default()
            .with_parallelism(8)
            .with_min_chunk_words(10)
            .with_memory_budget_bytes(3000);
        assert_eq!(config.plan_workers(1000, 1000).unwrap(), 3);
        assert_eq!(config.plan_workers(1000, 10).unwrap(), 8);
        assert_eq!(config.plan_workers(1000, 10_000).unwrap(), 1);
    }

    #[test]
    fn test_invalid_memory_fraction() {
        let config = ProcessorConfig::default().with_memory_fraction(1.5);
        assert!(matches!(
            config.resolve_budget_bytes(),
            Err(Error::ConfigError(_))
        ));
    }
}
