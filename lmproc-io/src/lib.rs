//! lmproc-io: File entry points for lmproc.
//!
//! This crate memory-maps list-mode streams via memmap2, loads the
//! geometry lookup tables, writes histogram results, and exposes
//! [`lmproc`], the one-call histogramming entry point over a stream file.
//!

mod error;
mod reader;
pub mod tables;
mod writer;

pub use error::{Error, Result};
pub use reader::{ListModeFile, MappedFileReader};
pub use tables::{read_axial_lut, read_lor_map};
pub use writer::{write_head_curve_csv, write_histograms};

use lmproc_core::{
    AxialLut, FrameSchedule, HistogramBuffers, HistogramOutput, HistogramShape, HistogramSummary,
    LorBinMap, ScannerConstants, TimeWindow,
};
use lmproc_mmr::ProcessorConfig;
use std::path::Path;

/// Histograms the list-mode file at `stream_path` over `[tstart, tstop)` ms
/// with the default [`ProcessorConfig`].
///
/// # Errors
/// - [`lmproc_core::Error::InvalidWindow`] before the file is touched
/// - [`Error::StreamUnavailable`] if the file cannot be opened or mapped
/// - any error of [`lmproc_mmr::process_stream`]
pub fn lmproc<P: AsRef<Path>>(
    out: &mut HistogramOutput<'_>,
    stream_path: P,
    tstart: i64,
    tstop: i64,
    lor_map: &LorBinMap,
    axial_lut: &AxialLut,
    constants: &ScannerConstants,
) -> Result<HistogramSummary> {
    lmproc_with_config(
        out,
        stream_path,
        tstart,
        tstop,
        lor_map,
        axial_lut,
        constants,
        &ProcessorConfig::default(),
    )
}

/// [`lmproc`] with an explicit [`ProcessorConfig`].
///
/// # Errors
/// Same as [`lmproc`].
#[allow(clippy::too_many_arguments)]
pub fn lmproc_with_config<P: AsRef<Path>>(
    out: &mut HistogramOutput<'_>,
    stream_path: P,
    tstart: i64,
    tstop: i64,
    lor_map: &LorBinMap,
    axial_lut: &AxialLut,
    constants: &ScannerConstants,
    config: &ProcessorConfig,
) -> Result<HistogramSummary> {
    let window = TimeWindow::new(tstart, tstop)?;
    let file = ListModeFile::open(stream_path)?;
    file.histogram(&window, lor_map, axial_lut, constants, out, config)
}

/// Histograms every frame of `schedule` from one mapping of the stream.
///
/// Each frame gets fresh buffers, handed to `on_frame` with its index,
/// window and summary before the next frame starts. Returns the summaries
/// in schedule order.
///
/// # Errors
/// Stops at the first failing frame or the first error from `on_frame`.
pub fn lmproc_frames<P, F>(
    stream_path: P,
    schedule: &FrameSchedule,
    lor_map: &LorBinMap,
    axial_lut: &AxialLut,
    constants: &ScannerConstants,
    config: &ProcessorConfig,
    mut on_frame: F,
) -> Result<Vec<HistogramSummary>>
where
    P: AsRef<Path>,
    F: FnMut(usize, &TimeWindow, &HistogramBuffers, &HistogramSummary) -> Result<()>,
{
    let file = ListModeFile::open(stream_path)?;
    let mut summaries = Vec::with_capacity(schedule.len());
    for (index, window) in schedule.windows().iter().enumerate() {
        let mut buffers = HistogramBuffers::new(&HistogramShape::new(constants, window));
        let summary =
            file.histogram(window, lor_map, axial_lut, constants, &mut buffers.output(), config)?;
        log::info!(
            "frame {index} [{}, {}) ms: {} prompts, {} delayeds",
            window.tstart(),
            window.tstop(),
            summary.psm,
            summary.dsm
        );
        on_frame(index, window, &buffers, &summary)?;
        summaries.push(summary);
    }
    Ok(summaries)
}
