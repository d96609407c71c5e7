//! Memory-mapped file readers.
//!

use crate::{Error, Result};
use lmproc_core::{
    AxialLut, HistogramOutput, HistogramSummary, LorBinMap, ScannerConstants, TimeWindow,
};
use lmproc_mmr::{process_stream, EventDecoder, ProcessorConfig, StreamSummary, WORD_SIZE};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns [`Error::StreamUnavailable`] if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::unavailable(path, e))?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::unavailable(path, e))?;
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A list-mode stream file with memory-mapped I/O.
pub struct ListModeFile {
    reader: MappedFileReader,
}

impl ListModeFile {
    /// Opens a list-mode file for reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        log::debug!(
            "mapped {} ({} bytes)",
            reader.path().display(),
            reader.len()
        );
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Returns the number of whole 32-bit words in the file.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.reader.len() / WORD_SIZE
    }

    /// Returns the raw stream.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.reader.as_bytes()
    }

    /// Lazy decoder over the whole file.
    #[must_use]
    pub fn records(&self) -> EventDecoder<'_> {
        EventDecoder::new(self.as_bytes())
    }

    /// Counts every record kind in the file.
    ///
    /// # Errors
    /// Returns an error if the file is truncated or holds an unknown record kind.
    pub fn summary(&self) -> Result<StreamSummary> {
        Ok(StreamSummary::scan(self.as_bytes())?)
    }

    /// Histograms the file into `out`.
    ///
    /// # Errors
    /// Returns an error if the tables, buffers or stream are invalid.
    pub fn histogram(
        &self,
        window: &TimeWindow,
        lor_map: &LorBinMap,
        axial: &AxialLut,
        constants: &ScannerConstants,
        out: &mut HistogramOutput<'_>,
        config: &ProcessorConfig,
    ) -> Result<HistogramSummary> {
        Ok(process_stream(
            self.as_bytes(),
            window,
            lor_map,
            axial,
            constants,
            out,
            config,
        )?)
    }
}
