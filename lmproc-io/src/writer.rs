//! File writers for histogram results.

use crate::Result;
use lmproc_core::HistogramBuffers;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes every histogram of a pass as a headerless little-endian file.
///
/// Files are named after the histogram (`psn.bin`, `hcp.bin`, ...). Counters
/// are `u32`, `bck.bin` holds `u64` and `mss.bin` holds `f32`.
///
/// # Errors
/// Returns an error if the directory cannot be created or a file cannot be written.
pub fn write_histograms<P: AsRef<Path>>(dir: P, hist: &HistogramBuffers) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let counters: [(&str, &[u32]); 7] = [
        ("snv", &hist.snv),
        ("hcp", &hist.hcp),
        ("hcd", &hist.hcd),
        ("fan", &hist.fan),
        ("ssr", &hist.ssr),
        ("psn", &hist.psn),
        ("dsn", &hist.dsn),
    ];
    let mut written = Vec::with_capacity(counters.len() + 2);
    for (name, values) in counters {
        let path = dir.join(format!("{name}.bin"));
        let mut writer = BufWriter::new(File::create(&path)?);
        for v in values {
            writer.write_all(&v.to_le_bytes())?;
        }
        writer.flush()?;
        written.push(path);
    }

    let path = dir.join("bck.bin");
    let mut writer = BufWriter::new(File::create(&path)?);
    for v in &hist.bck {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()?;
    written.push(path);

    let path = dir.join("mss.bin");
    let mut writer = BufWriter::new(File::create(&path)?);
    for v in &hist.mss {
        writer.write_all(&v.to_le_bytes())?;
    }
    writer.flush()?;
    written.push(path);

    log::debug!("wrote {} histogram files to {}", written.len(), dir.display());
    Ok(written)
}

/// Writes the head curves and axial centre of mass as CSV, one row per slot.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_head_curve_csv<P: AsRef<Path>>(
    path: P,
    hist: &HistogramBuffers,
    tstart_ms: u64,
    tag_period_ms: u32,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "slot,time_ms,prompts,delayeds,axial_centroid")?;
    for (slot, ((p, d), m)) in hist.hcp.iter().zip(&hist.hcd).zip(&hist.mss).enumerate() {
        let time = tstart_ms + slot as u64 * u64::from(tag_period_ms);
        writeln!(writer, "{slot},{time},{p},{d},{m}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn buffers() -> HistogramBuffers {
        HistogramBuffers {
            snv: vec![3, 1],
            hcp: vec![2, 2],
            hcd: vec![0, 1],
            fan: vec![1; 4],
            bck: vec![0, 9],
            mss: vec![1.5, 0.0],
            ssr: vec![4],
            psn: vec![4, 0],
            dsn: vec![0, 1],
        }
    }

    #[test]
    fn test_write_histograms() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_histograms(dir.path().join("out"), &buffers()).unwrap();
        assert_eq!(written.len(), 9);

        let psn = fs::read(dir.path().join("out/psn.bin")).unwrap();
        assert_eq!(psn, [4u8, 0, 0, 0, 0, 0, 0, 0]);
        let mss = fs::read(dir.path().join("out/mss.bin")).unwrap();
        assert_eq!(&mss[..4], &1.5f32.to_le_bytes());
        let bck = fs::read(dir.path().join("out/bck.bin")).unwrap();
        assert_eq!(bck.len(), 16);
        assert_eq!(&bck[8..], &9u64.to_le_bytes());
    }

    #[test]
    fn test_write_head_curve_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("head.csv");
        write_head_curve_csv(&path, &buffers(), 5000, 1000).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "slot,time_ms,prompts,delayeds,axial_centroid");
        assert_eq!(lines[1], "0,5000,2,0,1.5");
        assert_eq!(lines[2], "1,6000,2,1,0");
    }
}
