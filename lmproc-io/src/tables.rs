//! Geometry lookup table loaders.
//!
//! Both tables are flat arrays of little-endian `i16` records with no
//! header. A file whose size is not a whole number of records is rejected.

use crate::{Error, Result};
use lmproc_core::{AxialLut, LorBinMap};
use std::path::Path;

fn read_records<const N: usize>(path: &Path, table: &str) -> Result<Vec<[i16; N]>> {
    let bytes = std::fs::read(path).map_err(|e| Error::unavailable(path, e))?;
    let record_size = N * 2;
    if !bytes.len().is_multiple_of(record_size) {
        return Err(Error::InvalidFormat(format!(
            "{table} {} has {} bytes, not a multiple of {record_size}",
            path.display(),
            bytes.len()
        )));
    }

    let records = bytes
        .chunks_exact(record_size)
        .map(|chunk| {
            let mut record = [0i16; N];
            for (field, pair) in record.iter_mut().zip(chunk.chunks_exact(2)) {
                *field = i16::from_le_bytes([pair[0], pair[1]]);
            }
            record
        })
        .collect();
    Ok(records)
}

/// Loads the transaxial LOR-to-bin map.
///
/// Records with any negative field are unmapped addresses.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a whole number of records.
pub fn read_lor_map<P: AsRef<Path>>(path: P) -> Result<LorBinMap> {
    let path = path.as_ref();
    let records = read_records::<4>(path, "LOR-to-bin map")?;
    let map = LorBinMap::from_raw(&records);
    log::debug!(
        "loaded {} LOR-to-bin entries ({} mapped) from {}",
        map.len(),
        map.mapped(),
        path.display()
    );
    Ok(map)
}

/// Loads the axial ring-pair table.
///
/// Negative span-1 or span-11 indices mark ring pairs absent from that span.
///
/// # Errors
/// Returns an error if the file cannot be read, is not a whole number of
/// records, or has a record with a negative ring or SSRB index.
pub fn read_axial_lut<P: AsRef<Path>>(path: P) -> Result<AxialLut> {
    let path = path.as_ref();
    let records = read_records::<5>(path, "axial table")?;
    let lut = AxialLut::from_raw(&records)?;
    log::debug!("loaded {} axial entries from {}", lut.len(), path.display());
    Ok(lut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmproc_core::{LorBin, Span};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_i16(values: &[i16]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for v in values {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_lor_map() {
        let file = write_i16(&[0, 1, 2, 300, -1, -1, -1, -1, 5, 6, 7, 8]);
        let map = read_lor_map(file.path()).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.mapped(), 2);
        assert_eq!(
            map.get(0),
            Some(LorBin {
                view: 0,
                radial: 1,
                crystal_a: 2,
                crystal_b: 300
            })
        );
        assert_eq!(map.get(1), None);
        assert_eq!(map.get(2).unwrap().crystal_b, 8);
    }

    #[test]
    fn test_read_axial_lut() {
        let file = write_i16(&[0, 0, 0, 0, 0, 0, 12, 12, -1, 6]);
        let lut = read_axial_lut(file.path()).unwrap();

        assert_eq!(lut.len(), 2);
        let oblique = lut.get(1).unwrap();
        assert_eq!(oblique.ring_difference(), 12);
        assert_eq!(oblique.full_index(Span::One), Some(12));
        assert_eq!(oblique.full_index(Span::Eleven), None);
        assert_eq!(oblique.ssrb, 6);
    }

    #[test]
    fn test_partial_record_rejected() {
        let file = write_i16(&[0, 1, 2]);
        assert!(matches!(
            read_lor_map(file.path()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_negative_ring_rejected() {
        let file = write_i16(&[-1, 0, 0, 0, 0]);
        assert!(matches!(
            read_axial_lut(file.path()),
            Err(Error::CoreError(lmproc_core::Error::ConfigError(_)))
        ));
    }
}
