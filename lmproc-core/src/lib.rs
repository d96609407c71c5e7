//! lmproc-core: Core types for list-mode PET histogramming.
//!
//! This crate provides the read-only inputs of a histogramming pass
//! (scanner constants and geometry lookup tables), the time window and
//! running clock, frame schedules for dynamic studies, and the histogram
//! buffers the pass writes into.
//!

pub mod constants;
pub mod error;
pub mod frames;
pub mod geometry;
pub mod histogram;
pub mod window;

pub use constants::{ScannerConstants, Span};
pub use error::{Error, MalformedReason, Result};
pub use frames::FrameSchedule;
pub use geometry::{AxialEntry, AxialLut, LorBin, LorBinMap};
pub use histogram::{
    CentroidSums, Counters, HistogramBuffers, HistogramOutput, HistogramShape, HistogramSummary,
    Histograms,
};
pub use window::{ClockState, TimeWindow};
