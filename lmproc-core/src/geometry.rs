//! Geometry lookup tables.
//!
//! A coincidence word carries a LOR code made of two parts: a transaxial
//! address (view and radial bin) and a ring-pair code. [`LorBinMap`]
//! resolves the first, [`AxialLut`] the second. Both are built by the
//! caller and are read-only during a pass.

use crate::{Error, Result, ScannerConstants, Span};

/// Sinogram bin and crystal pair of one transaxial address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LorBin {
    /// Angular view index.
    pub view: u16,
    /// Radial bin index.
    pub radial: u16,
    /// Transaxial index of the first crystal.
    pub crystal_a: u16,
    /// Transaxial index of the second crystal.
    pub crystal_b: u16,
}

impl LorBin {
    /// Decode a raw record of `[view, radial, crystal_a, crystal_b]`.
    ///
    /// Any negative field marks the address as unmapped.
    #[must_use]
    pub fn from_raw(raw: [i16; 4]) -> Option<Self> {
        let [view, radial, crystal_a, crystal_b] = raw;
        Some(Self {
            view: u16::try_from(view).ok()?,
            radial: u16::try_from(radial).ok()?,
            crystal_a: u16::try_from(crystal_a).ok()?,
            crystal_b: u16::try_from(crystal_b).ok()?,
        })
    }
}

/// Transaxial address → sinogram bin and crystal pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LorBinMap {
    entries: Vec<Option<LorBin>>,
}

impl LorBinMap {
    /// Creates a map from one entry per transaxial address.
    #[must_use]
    pub fn new(entries: Vec<Option<LorBin>>) -> Self {
        Self { entries }
    }

    /// Creates a map from raw `[view, radial, crystal_a, crystal_b]` records.
    #[must_use]
    pub fn from_raw(records: &[[i16; 4]]) -> Self {
        Self::new(records.iter().copied().map(LorBin::from_raw).collect())
    }

    /// Looks up a transaxial address.
    #[inline]
    #[must_use]
    pub fn get(&self, address: usize) -> Option<LorBin> {
        self.entries.get(address).copied().flatten()
    }

    /// Number of addresses covered by the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of addresses with a valid entry.
    #[must_use]
    pub fn mapped(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Check the map against the scanner dimensions.
    ///
    /// Only array bounds are checked; the geometry itself is trusted.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the map has the wrong length or an
    /// entry points outside the sinogram or crystal ranges.
    pub fn validate(&self, constants: &ScannerConstants) -> Result<()> {
        if self.entries.len() != constants.transaxial_bins() {
            return Err(Error::ConfigError(format!(
                "LOR-to-bin map has {} entries, expected {}",
                self.entries.len(),
                constants.transaxial_bins()
            )));
        }
        for (address, bin) in self.entries.iter().enumerate() {
            let Some(bin) = bin else { continue };
            if usize::from(bin.view) >= constants.nsangles
                || usize::from(bin.radial) >= constants.nsbins
                || usize::from(bin.crystal_a) >= constants.ncrystals
                || usize::from(bin.crystal_b) >= constants.ncrystals
            {
                return Err(Error::ConfigError(format!(
                    "LOR-to-bin entry {address} out of range: {bin:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Axial placement of one ring pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxialEntry {
    /// Ring of the first crystal.
    pub ring_a: u16,
    /// Ring of the second crystal.
    pub ring_b: u16,
    /// Span-1 sinogram index, `None` outside the acceptance.
    pub span1: Option<u32>,
    /// Span-11 sinogram index, `None` outside the acceptance.
    pub span11: Option<u32>,
    /// Single-slice rebinned sinogram index.
    pub ssrb: u16,
}

impl AxialEntry {
    /// Decode a raw record of `[ring_a, ring_b, span1, span11, ssrb]`.
    ///
    /// Negative sinogram indices mean "not in this span". Negative rings or
    /// SSRB index make the whole record invalid.
    #[must_use]
    pub fn from_raw(raw: [i16; 5]) -> Option<Self> {
        let [ring_a, ring_b, span1, span11, ssrb] = raw;
        Some(Self {
            ring_a: u16::try_from(ring_a).ok()?,
            ring_b: u16::try_from(ring_b).ok()?,
            span1: u32::try_from(span1).ok(),
            span11: u32::try_from(span11).ok(),
            ssrb: u16::try_from(ssrb).ok()?,
        })
    }

    /// Absolute ring difference of the pair.
    #[inline]
    #[must_use]
    pub fn ring_difference(&self) -> usize {
        usize::from(self.ring_a.abs_diff(self.ring_b))
    }

    /// Full sinogram index for the given span.
    #[inline]
    #[must_use]
    pub fn full_index(&self, span: Span) -> Option<u32> {
        match span {
            Span::One => self.span1,
            Span::Eleven => self.span11,
        }
    }
}

/// Ring-pair code → axial placement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxialLut {
    entries: Vec<AxialEntry>,
}

impl AxialLut {
    /// Creates a table from one entry per ring-pair code.
    #[must_use]
    pub fn new(entries: Vec<AxialEntry>) -> Self {
        Self { entries }
    }

    /// Creates a table from raw records.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if a record has a negative ring or
    /// SSRB index.
    pub fn from_raw(records: &[[i16; 5]]) -> Result<Self> {
        let entries = records
            .iter()
            .enumerate()
            .map(|(code, &raw)| {
                AxialEntry::from_raw(raw).ok_or_else(|| {
                    Error::ConfigError(format!("axial entry {code} is invalid: {raw:?}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    /// Looks up a ring-pair code.
    #[inline]
    #[must_use]
    pub fn get(&self, code: usize) -> Option<&AxialEntry> {
        self.entries.get(code)
    }

    /// Number of ring-pair codes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the table against the scanner dimensions.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the table is longer than the ring
    /// pairs a word can address or an entry points outside its array.
    pub fn validate(&self, constants: &ScannerConstants) -> Result<()> {
        if self.entries.len() > constants.ring_pairs() {
            return Err(Error::ConfigError(format!(
                "axial table has {} entries, at most {} ring pairs exist",
                self.entries.len(),
                constants.ring_pairs()
            )));
        }
        for (code, entry) in self.entries.iter().enumerate() {
            let span1_ok = entry.span1.is_none_or(|i| (i as usize) < constants.nsn1);
            let span11_ok = entry.span11.is_none_or(|i| (i as usize) < constants.nsn11);
            if usize::from(entry.ring_a) >= constants.nrings
                || usize::from(entry.ring_b) >= constants.nrings
                || usize::from(entry.ssrb) >= constants.nseg0
                || !span1_ok
                || !span11_ok
            {
                return Err(Error::ConfigError(format!(
                    "axial entry {code} out of range: {entry:?}"
                )));
            }
        }
        Ok(())
    }
}
