//! Histogram accumulator.
//!
//! Resolves a coincidence's LOR code through the geometry tables and
//! increments every histogram the event belongs to.

use lmproc_core::{
    AxialLut, Counters, Error, LorBinMap, MalformedReason, Result, ScannerConstants, TimeWindow,
};

/// Whether a coincidence reached the sinograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binning {
    /// Counted in every histogram.
    Binned,
    /// Outside the axial acceptance: counted in head curve and fan sums only.
    Excluded,
}

/// Read-only context shared by every worker of a pass.
#[derive(Debug, Clone, Copy)]
pub struct Accumulator<'t> {
    lor_map: &'t LorBinMap,
    axial: &'t AxialLut,
    constants: &'t ScannerConstants,
    window: TimeWindow,
    transaxial: usize,
}

impl<'t> Accumulator<'t> {
    /// Creates an accumulator over validated tables.
    #[must_use]
    pub fn new(
        lor_map: &'t LorBinMap,
        axial: &'t AxialLut,
        constants: &'t ScannerConstants,
        window: TimeWindow,
    ) -> Self {
        Self {
            lor_map,
            axial,
            constants,
            window,
            transaxial: constants.transaxial_bins(),
        }
    }

    /// The acquisition window of the pass.
    #[must_use]
    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// Head-curve slot duration.
    #[must_use]
    pub fn tag_period_ms(&self) -> u32 {
        self.constants.tag_period_ms
    }

    /// Count one admitted coincidence in time slot `slot`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRecord`] if the LOR code does not resolve
    /// through both tables.
    #[inline]
    pub fn coincidence(
        &self,
        offset: usize,
        word: u32,
        lor: u32,
        prompt: bool,
        slot: usize,
        counters: &mut Counters<'_>,
    ) -> Result<Binning> {
        let lor = lor as usize;
        let ring_pair = lor / self.transaxial;
        let address = lor % self.transaxial;

        let bin = self
            .lor_map
            .get(address)
            .ok_or_else(|| Error::malformed(offset, word, MalformedReason::UnmappedLor))?;
        let axial = self
            .axial
            .get(ring_pair)
            .ok_or_else(|| Error::malformed(offset, word, MalformedReason::RingPairOutOfRange))?;

        // Head curve and fan sums ignore the axial acceptance.
        if prompt {
            counters.hcp[slot] += 1;
        } else {
            counters.hcd[slot] += 1;
        }
        let ncrystals = self.constants.ncrystals;
        counters.fan[usize::from(axial.ring_a) * ncrystals + usize::from(bin.crystal_a)] += 1;
        counters.fan[usize::from(axial.ring_b) * ncrystals + usize::from(bin.crystal_b)] += 1;

        if axial.ring_difference() > self.constants.max_ring_difference {
            return Ok(Binning::Excluded);
        }
        let Some(full) = axial.full_index(self.constants.span) else {
            return Ok(Binning::Excluded);
        };

        let view = usize::from(bin.view);
        let transaxial = view * self.constants.nsbins + usize::from(bin.radial);
        counters.ssr[usize::from(axial.ssrb) * self.transaxial + transaxial] += 1;

        let sino = full as usize * self.transaxial + transaxial;
        if prompt {
            counters.psn[sino] += 1;
            *counters.psm += 1;
        } else {
            counters.dsn[sino] += 1;
            *counters.dsm += 1;
        }
        counters.snv[view] += 1;
        counters.centroid.add(slot, axial.ssrb);

        Ok(Binning::Binned)
    }

    /// Count one admitted bucket singles record.
    ///
    /// # Errors
    /// Returns [`Error::MalformedRecord`] if the bucket index is past the
    /// configured bucket count.
    #[inline]
    pub fn bucket(
        &self,
        offset: usize,
        word: u32,
        bucket: u16,
        delta: u32,
        counters: &mut Counters<'_>,
    ) -> Result<()> {
        let slot = counters
            .bck
            .get_mut(usize::from(bucket))
            .ok_or_else(|| Error::malformed(offset, word, MalformedReason::BucketOutOfRange))?;
        *slot += u64::from(delta);
        Ok(())
    }
}
