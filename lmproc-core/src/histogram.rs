//! Histogram buffers.
//!
//! [`HistogramOutput`] is the caller's view: mutable slices into memory the
//! caller owns. [`Histograms`] is private worker scratch of the same shape,
//! summed into the output once all workers finish. Both hand out a
//! [`Counters`] view so the accumulator writes through a single type.

use crate::{Error, Result, ScannerConstants, TimeWindow};
use serde::Serialize;
use std::ops::AddAssign;

/// Lengths of every histogram for one geometry and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramShape {
    /// Head-curve / centre-of-mass slots.
    pub slots: usize,
    /// Angular views (`snv`).
    pub views: usize,
    /// Crystals (`fan`).
    pub crystals: usize,
    /// Buckets (`bck`).
    pub buckets: usize,
    /// SSRB sinogram bins (`ssr`).
    pub ssr: usize,
    /// Full sinogram bins (`psn`, `dsn`).
    pub sinogram: usize,
}

impl HistogramShape {
    /// Shape implied by the scanner constants and the window.
    #[must_use]
    pub fn new(constants: &ScannerConstants, window: &TimeWindow) -> Self {
        Self {
            slots: window.slot_count(constants.tag_period_ms),
            views: constants.nsangles,
            crystals: constants.crystal_count(),
            buckets: constants.nbuckets,
            ssr: constants.ssrb_len(),
            sinogram: constants.sinogram_len(),
        }
    }

    /// Bytes of one [`Histograms`] scratch set.
    #[must_use]
    pub fn scratch_bytes(&self) -> usize {
        let counters = self.views + 2 * self.slots + self.crystals + self.ssr + 2 * self.sinogram;
        counters * std::mem::size_of::<u32>()
            + self.buckets * std::mem::size_of::<u64>()
            + self.slots * (std::mem::size_of::<f64>() + std::mem::size_of::<u64>())
    }
}

/// Running per-slot sums for the axial centre of mass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentroidSums {
    sum: Vec<f64>,
    count: Vec<u64>,
}

impl CentroidSums {
    /// Zeroed sums for `slots` head-curve slots.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            sum: vec![0.0; slots],
            count: vec![0; slots],
        }
    }

    /// Add one axial sample to a slot.
    #[inline]
    pub fn add(&mut self, slot: usize, axial: u16) {
        self.sum[slot] += f64::from(axial);
        self.count[slot] += 1;
    }

    /// Element-wise sum with another set of the same length.
    pub fn merge(&mut self, other: &CentroidSums) {
        for (a, b) in self.sum.iter_mut().zip(&other.sum) {
            *a += b;
        }
        for (a, b) in self.count.iter_mut().zip(&other.count) {
            *a += b;
        }
    }

    /// Events contributing to a slot.
    #[must_use]
    pub fn count(&self, slot: usize) -> u64 {
        self.count[slot]
    }

    /// Write `sum / count` per slot; empty slots report 0.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn finalize_into(&self, mss: &mut [f32]) {
        for ((m, &sum), &count) in mss.iter_mut().zip(&self.sum).zip(&self.count) {
            *m = if count == 0 {
                0.0
            } else {
                (sum / count as f64) as f32
            };
        }
    }
}

/// Mutable view of every counter a pass increments.
pub struct Counters<'a> {
    pub snv: &'a mut [u32],
    pub hcp: &'a mut [u32],
    pub hcd: &'a mut [u32],
    pub fan: &'a mut [u32],
    pub bck: &'a mut [u64],
    pub ssr: &'a mut [u32],
    pub psn: &'a mut [u32],
    pub dsn: &'a mut [u32],
    pub psm: &'a mut u64,
    pub dsm: &'a mut u64,
    pub centroid: &'a mut CentroidSums,
}

/// Caller-owned histogram outputs of one pass.
///
/// Every slice must have the length given by [`HistogramShape`]; the pass
/// overwrites their contents and the scalar fields.
#[derive(Debug)]
pub struct HistogramOutput<'a> {
    /// Distinct time-tag intervals observed in the window.
    pub nitag: usize,
    /// Number of elements in `snv`.
    pub sne: usize,
    /// Sino views: counts per angular view.
    pub snv: &'a mut [u32],
    /// Head curve, prompts.
    pub hcp: &'a mut [u32],
    /// Head curve, delayeds.
    pub hcd: &'a mut [u32],
    /// Fan sums per crystal.
    pub fan: &'a mut [u32],
    /// Bucket singles, 64-bit like the grand totals.
    pub bck: &'a mut [u64],
    /// Axial centre of mass per slot.
    pub mss: &'a mut [f32],
    /// SSRB sinogram.
    pub ssr: &'a mut [u32],
    /// Prompt sinogram.
    pub psn: &'a mut [u32],
    /// Delayed sinogram.
    pub dsn: &'a mut [u32],
    /// Prompt sum.
    pub psm: u64,
    /// Delayed sum.
    pub dsm: u64,
    /// Total number of full sinogram bins.
    pub tot: usize,
}

impl<'a> HistogramOutput<'a> {
    /// Bundle caller buffers into an output view with zeroed scalars.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        snv: &'a mut [u32],
        hcp: &'a mut [u32],
        hcd: &'a mut [u32],
        fan: &'a mut [u32],
        bck: &'a mut [u64],
        mss: &'a mut [f32],
        ssr: &'a mut [u32],
        psn: &'a mut [u32],
        dsn: &'a mut [u32],
    ) -> Self {
        Self {
            nitag: 0,
            sne: 0,
            snv,
            hcp,
            hcd,
            fan,
            bck,
            mss,
            ssr,
            psn,
            dsn,
            psm: 0,
            dsm: 0,
            tot: 0,
        }
    }

    /// Check every buffer length against the expected shape.
    ///
    /// # Errors
    /// Returns [`Error::SizeMismatch`] for the first buffer of the wrong length.
    pub fn check_shape(&self, shape: &HistogramShape) -> Result<()> {
        let lengths = [
            ("snv", shape.views, self.snv.len()),
            ("hcp", shape.slots, self.hcp.len()),
            ("hcd", shape.slots, self.hcd.len()),
            ("fan", shape.crystals, self.fan.len()),
            ("bck", shape.buckets, self.bck.len()),
            ("mss", shape.slots, self.mss.len()),
            ("ssr", shape.ssr, self.ssr.len()),
            ("psn", shape.sinogram, self.psn.len()),
            ("dsn", shape.sinogram, self.dsn.len()),
        ];
        for (buffer, expected, actual) in lengths {
            if expected != actual {
                return Err(Error::SizeMismatch {
                    buffer,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Zero every counter and scalar.
    pub fn reset(&mut self) {
        for buffer in [
            &mut *self.snv,
            &mut *self.hcp,
            &mut *self.hcd,
            &mut *self.fan,
            &mut *self.ssr,
            &mut *self.psn,
            &mut *self.dsn,
        ] {
            buffer.fill(0);
        }
        self.bck.fill(0);
        self.mss.fill(0.0);
        self.nitag = 0;
        self.sne = 0;
        self.psm = 0;
        self.dsm = 0;
        self.tot = 0;
    }

    /// Counters writing straight into the caller's buffers.
    pub fn counters<'b>(&'b mut self, centroid: &'b mut CentroidSums) -> Counters<'b> {
        Counters {
            snv: &mut *self.snv,
            hcp: &mut *self.hcp,
            hcd: &mut *self.hcd,
            fan: &mut *self.fan,
            bck: &mut *self.bck,
            ssr: &mut *self.ssr,
            psn: &mut *self.psn,
            dsn: &mut *self.dsn,
            psm: &mut self.psm,
            dsm: &mut self.dsm,
            centroid,
        }
    }

    /// Finalise the running sums once all counts are in.
    pub fn assemble(&mut self, centroid: &CentroidSums, nitag: usize) {
        centroid.finalize_into(self.mss);
        self.nitag = nitag;
        self.sne = self.snv.len();
        self.tot = self.psn.len();
    }

    /// Summary of the scalar results.
    #[must_use]
    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            nitag: self.nitag,
            psm: self.psm,
            dsm: self.dsm,
            tot: self.tot,
            ..HistogramSummary::default()
        }
    }
}

/// Private per-worker histograms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histograms {
    pub snv: Vec<u32>,
    pub hcp: Vec<u32>,
    pub hcd: Vec<u32>,
    pub fan: Vec<u32>,
    pub bck: Vec<u64>,
    pub ssr: Vec<u32>,
    pub psn: Vec<u32>,
    pub dsn: Vec<u32>,
    pub psm: u64,
    pub dsm: u64,
    pub centroid: CentroidSums,
}

impl Histograms {
    /// Zeroed scratch of the given shape.
    #[must_use]
    pub fn zeroed(shape: &HistogramShape) -> Self {
        Self {
            snv: vec![0; shape.views],
            hcp: vec![0; shape.slots],
            hcd: vec![0; shape.slots],
            fan: vec![0; shape.crystals],
            bck: vec![0; shape.buckets],
            ssr: vec![0; shape.ssr],
            psn: vec![0; shape.sinogram],
            dsn: vec![0; shape.sinogram],
            psm: 0,
            dsm: 0,
            centroid: CentroidSums::new(shape.slots),
        }
    }

    /// Counters writing into this scratch set.
    pub fn counters(&mut self) -> Counters<'_> {
        Counters {
            snv: &mut self.snv,
            hcp: &mut self.hcp,
            hcd: &mut self.hcd,
            fan: &mut self.fan,
            bck: &mut self.bck,
            ssr: &mut self.ssr,
            psn: &mut self.psn,
            dsn: &mut self.dsn,
            psm: &mut self.psm,
            dsm: &mut self.dsm,
            centroid: &mut self.centroid,
        }
    }

    /// Add this scratch set into the caller's output and centroid sums.
    pub fn add_into(&self, out: &mut HistogramOutput<'_>, centroid: &mut CentroidSums) {
        add_slice(out.snv, &self.snv);
        add_slice(out.hcp, &self.hcp);
        add_slice(out.hcd, &self.hcd);
        add_slice(out.fan, &self.fan);
        add_slice(out.bck, &self.bck);
        add_slice(out.ssr, &self.ssr);
        add_slice(out.psn, &self.psn);
        add_slice(out.dsn, &self.dsn);
        out.psm += self.psm;
        out.dsm += self.dsm;
        centroid.merge(&self.centroid);
    }
}

#[inline]
fn add_slice<T: Copy + AddAssign>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

/// Owned output buffers for callers that do not manage their own memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramBuffers {
    pub snv: Vec<u32>,
    pub hcp: Vec<u32>,
    pub hcd: Vec<u32>,
    pub fan: Vec<u32>,
    pub bck: Vec<u64>,
    pub mss: Vec<f32>,
    pub ssr: Vec<u32>,
    pub psn: Vec<u32>,
    pub dsn: Vec<u32>,
}

impl HistogramBuffers {
    /// Zero-initialised buffers of the given shape.
    #[must_use]
    pub fn new(shape: &HistogramShape) -> Self {
        Self {
            snv: vec![0; shape.views],
            hcp: vec![0; shape.slots],
            hcd: vec![0; shape.slots],
            fan: vec![0; shape.crystals],
            bck: vec![0; shape.buckets],
            mss: vec![0.0; shape.slots],
            ssr: vec![0; shape.ssr],
            psn: vec![0; shape.sinogram],
            dsn: vec![0; shape.sinogram],
        }
    }

    /// Lend the buffers out as a [`HistogramOutput`].
    pub fn output(&mut self) -> HistogramOutput<'_> {
        HistogramOutput::new(
            &mut self.snv,
            &mut self.hcp,
            &mut self.hcd,
            &mut self.fan,
            &mut self.bck,
            &mut self.mss,
            &mut self.ssr,
            &mut self.psn,
            &mut self.dsn,
        )
    }
}

/// Scalar results and bookkeeping of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistogramSummary {
    /// Distinct time-tag intervals observed in the window.
    pub nitag: usize,
    /// Prompts binned into the sinogram.
    pub psm: u64,
    /// Delayeds binned into the sinogram.
    pub dsm: u64,
    /// Total number of full sinogram bins.
    pub tot: usize,
    /// Words decoded, including those outside the window.
    pub records_decoded: u64,
    /// Coincidence and singles records inside the window.
    pub events_admitted: u64,
    /// Coincidences outside the axial acceptance.
    pub events_excluded: u64,
    /// Chunks processed (1 for a sequential pass).
    pub chunks: usize,
    /// True if a time tag reached `tstop`; false if the stream ended first.
    pub window_closed: bool,
}
