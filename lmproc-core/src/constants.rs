//! Scanner constants.
//!
//! Fixed geometry and size parameters that constrain every array a
//! histogramming pass touches. Defaults describe the Siemens Biograph mMR.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Axial compression of the full sinogram.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Span {
    /// One sinogram per ring pair.
    One,
    /// Ring pairs compressed into span-11 segments.
    Eleven,
}

impl TryFrom<u8> for Span {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Span::One),
            11 => Ok(Span::Eleven),
            other => Err(format!("unsupported span {other}, expected 1 or 11")),
        }
    }
}

impl From<Span> for u8 {
    fn from(span: Span) -> Self {
        match span {
            Span::One => 1,
            Span::Eleven => 11,
        }
    }
}

/// Scanner geometry and sinogram dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScannerConstants {
    /// Crystals per ring (transaxial).
    pub ncrystals: usize,
    /// Number of detector rings.
    pub nrings: usize,
    /// Number of bucket (singles) channels.
    pub nbuckets: usize,
    /// Angular views per sinogram.
    pub nsangles: usize,
    /// Radial bins per view.
    pub nsbins: usize,
    /// Number of span-1 sinograms.
    pub nsn1: usize,
    /// Number of span-11 sinograms.
    pub nsn11: usize,
    /// Number of single-slice rebinned sinograms.
    pub nseg0: usize,
    /// Largest ring difference accepted into the sinograms (inclusive).
    pub max_ring_difference: usize,
    /// Duration of one head-curve interval in milliseconds.
    pub tag_period_ms: u32,
    /// Axial compression used for `psn`/`dsn`.
    pub span: Span,
}

impl Default for ScannerConstants {
    fn default() -> Self {
        Self::mmr_defaults()
    }
}

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
struct JsonConfig {
    scanner: JsonScanner,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonScanner {
    geometry: JsonGeometry,
    sinogram: JsonSinogram,
    timing: JsonTiming,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonGeometry {
    ncrystals: usize,
    nrings: usize,
    nbuckets: usize,
}

impl Default for JsonGeometry {
    fn default() -> Self {
        let mmr = ScannerConstants::mmr_defaults();
        Self {
            ncrystals: mmr.ncrystals,
            nrings: mmr.nrings,
            nbuckets: mmr.nbuckets,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonSinogram {
    nsangles: usize,
    nsbins: usize,
    nsn1: usize,
    nsn11: usize,
    nseg0: usize,
    max_ring_difference: usize,
    span: Span,
}

impl Default for JsonSinogram {
    fn default() -> Self {
        let mmr = ScannerConstants::mmr_defaults();
        Self {
            nsangles: mmr.nsangles,
            nsbins: mmr.nsbins,
            nsn1: mmr.nsn1,
            nsn11: mmr.nsn11,
            nseg0: mmr.nseg0,
            max_ring_difference: mmr.max_ring_difference,
            span: mmr.span,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonTiming {
    tag_period_ms: u32,
}

impl Default for JsonTiming {
    fn default() -> Self {
        Self {
            tag_period_ms: ScannerConstants::mmr_defaults().tag_period_ms,
        }
    }
}

impl ScannerConstants {
    /// Siemens Biograph mMR constants.
    ///
    /// 64 rings of 504 crystals (gaps included), 252 views of 344 bins,
    /// span-11 compression with a maximum ring difference of 60 and
    /// one head-curve slot per second.
    #[must_use]
    pub fn mmr_defaults() -> Self {
        Self {
            ncrystals: 504,
            nrings: 64,
            nbuckets: 224,
            nsangles: 252,
            nsbins: 344,
            nsn1: 4084,
            nsn11: 837,
            nseg0: 127,
            max_ring_difference: 60,
            tag_period_ms: 1000,
            span: Span::Eleven,
        }
    }

    /// Load constants from a JSON file.
    ///
    /// Missing fields fall back to the mMR defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// describes an inconsistent geometry.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!("{}: {e}", path.as_ref().display()))
        })?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig =
            serde_json::from_reader(reader).map_err(|e| Error::ConfigError(e.to_string()))?;
        Self::from_json_config(json_config)
    }

    /// Load constants from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON or describes an
    /// inconsistent geometry.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig =
            serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let scanner = config.scanner;
        let constants = Self {
            ncrystals: scanner.geometry.ncrystals,
            nrings: scanner.geometry.nrings,
            nbuckets: scanner.geometry.nbuckets,
            nsangles: scanner.sinogram.nsangles,
            nsbins: scanner.sinogram.nsbins,
            nsn1: scanner.sinogram.nsn1,
            nsn11: scanner.sinogram.nsn11,
            nseg0: scanner.sinogram.nseg0,
            max_ring_difference: scanner.sinogram.max_ring_difference,
            tag_period_ms: scanner.timing.tag_period_ms,
            span: scanner.sinogram.span,
        };
        constants.validate()?;
        Ok(constants)
    }

    /// Check that every dimension is usable.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let dimensions = [
            ("ncrystals", self.ncrystals),
            ("nrings", self.nrings),
            ("nbuckets", self.nbuckets),
            ("nsangles", self.nsangles),
            ("nsbins", self.nsbins),
            ("nseg0", self.nseg0),
            ("tag_period_ms", self.tag_period_ms as usize),
        ];
        for (name, value) in dimensions {
            if value == 0 {
                return Err(Error::ConfigError(format!("{name} must be positive")));
            }
        }
        if self.nsn() == 0 {
            return Err(Error::ConfigError(format!(
                "no sinograms configured for span {}",
                u8::from(self.span)
            )));
        }
        if self.max_ring_difference >= self.nrings {
            return Err(Error::ConfigError(format!(
                "max_ring_difference {} must be below nrings {}",
                self.max_ring_difference, self.nrings
            )));
        }
        let product = |name: &str, a: usize, b: usize| {
            a.checked_mul(b)
                .ok_or_else(|| Error::ConfigError(format!("{name} overflows: {a} x {b}")))
        };
        let transaxial = product("transaxial bins", self.nsangles, self.nsbins)?;
        product("sinogram length", self.nsn(), transaxial)?;
        product("SSRB length", self.nseg0, transaxial)?;
        product("crystal count", self.ncrystals, self.nrings)?;
        let ring_pairs = product("ring pairs", self.nrings, self.nrings)?;
        // Coincidence words carry 30 bits of LOR address.
        let addresses = product("LOR addresses", ring_pairs, transaxial)?;
        if addresses > (1 << 30) {
            return Err(Error::ConfigError(format!(
                "{addresses} LOR addresses do not fit a 30-bit code"
            )));
        }
        Ok(())
    }

    /// Number of full sinograms for the configured span.
    #[must_use]
    pub fn nsn(&self) -> usize {
        match self.span {
            Span::One => self.nsn1,
            Span::Eleven => self.nsn11,
        }
    }

    /// Bins in one 2-D sinogram (views times radial bins).
    #[must_use]
    pub fn transaxial_bins(&self) -> usize {
        self.nsangles * self.nsbins
    }

    /// Bins in each full sinogram array (`psn`, `dsn`).
    #[must_use]
    pub fn sinogram_len(&self) -> usize {
        self.nsn() * self.transaxial_bins()
    }

    /// Bins in the single-slice rebinned sinogram (`ssr`).
    #[must_use]
    pub fn ssrb_len(&self) -> usize {
        self.nseg0 * self.transaxial_bins()
    }

    /// Number of crystals in the scanner (`fan` length).
    #[must_use]
    pub fn crystal_count(&self) -> usize {
        self.ncrystals * self.nrings
    }

    /// Ring-pair codes addressable by a coincidence word.
    #[must_use]
    pub fn ring_pairs(&self) -> usize {
        self.nrings * self.nrings
    }
}
