//! lmproc command-line interface.
//!
//! Histograms mMR list-mode files and prints stream censuses.
#![allow(clippy::cast_precision_loss, clippy::too_many_lines)]

use clap::{Parser, Subcommand};
use lmproc_core::{
    FrameSchedule, HistogramBuffers, HistogramShape, HistogramSummary, ScannerConstants, TimeWindow,
};
use lmproc_io::{read_axial_lut, read_lor_map, ListModeFile};
use lmproc_mmr::ProcessorConfig;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    LmprocIo(#[from] lmproc_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] lmproc_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// List-mode PET histogramming.
#[derive(Parser)]
#[command(name = "lmproc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Histogram a list-mode file over a time window
    Histogram {
        /// Input list-mode file
        input: PathBuf,

        /// LOR-to-bin map (4 x i16 records)
        #[arg(long)]
        lor_map: PathBuf,

        /// Axial ring-pair table (5 x i16 records)
        #[arg(long)]
        axial_lut: PathBuf,

        /// Scanner constants JSON (defaults to the mMR geometry)
        #[arg(short, long)]
        constants: Option<PathBuf>,

        /// Window start (ms, inclusive)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        tstart: i64,

        /// Window stop (ms, exclusive)
        #[arg(long, allow_negative_numbers = true, required_unless_present = "frames")]
        tstop: Option<i64>,

        /// Dynamic frames from --tstart, as COUNTxMS groups (e.g. 4x15000,8x30000)
        #[arg(long, conflicts_with_all = ["tstop", "head_curve"])]
        frames: Option<String>,

        /// Process on a single thread
        #[arg(long)]
        sequential: bool,

        /// Maximum number of worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Fraction of available memory for worker histograms
        #[arg(long)]
        memory_fraction: Option<f64>,

        /// Directory for the raw histogram files (one subdirectory per frame)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// CSV file for the head curves and axial centre of mass
        #[arg(long)]
        head_curve: Option<PathBuf>,

        /// Print the pass summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show information about a list-mode file
    Info {
        /// Input list-mode file
        input: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_frame(window: &TimeWindow, summary: &HistogramSummary) {
    println!(
        "  [{}, {}) ms: {} prompts, {} delayeds, {} interval(s){}",
        window.tstart(),
        window.tstop(),
        summary.psm,
        summary.dsm,
        summary.nitag,
        if summary.window_closed {
            ""
        } else {
            ", stream ended early"
        }
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Histogram {
            input,
            lor_map,
            axial_lut,
            constants,
            tstart,
            tstop,
            frames,
            sequential,
            threads,
            memory_fraction,
            output_dir,
            head_curve,
            json,
        } => {
            let constants = match constants {
                Some(path) => ScannerConstants::from_file(path)?,
                None => ScannerConstants::mmr_defaults(),
            };
            let lor_map = read_lor_map(&lor_map)?;
            let axial = read_axial_lut(&axial_lut)?;

            let mut config = if sequential {
                ProcessorConfig::sequential()
            } else {
                ProcessorConfig::default()
            };
            if let Some(threads) = threads {
                config = config.with_parallelism(threads);
            }
            if let Some(fraction) = memory_fraction {
                config = config.with_memory_fraction(fraction);
            }

            if let Some(definition) = frames {
                let schedule = FrameSchedule::parse(&definition, tstart)?;
                let start = Instant::now();
                let summaries = lmproc_io::lmproc_frames(
                    &input,
                    &schedule,
                    &lor_map,
                    &axial,
                    &constants,
                    &config,
                    |index, window, buffers, _| {
                        if let Some(dir) = &output_dir {
                            let frame_dir = dir.join(format!("frame_{index:03}"));
                            lmproc_io::write_histograms(&frame_dir, buffers)?;
                            lmproc_io::write_head_curve_csv(
                                frame_dir.join("head_curve.csv"),
                                buffers,
                                window.tstart(),
                                constants.tag_period_ms,
                            )?;
                        }
                        Ok(())
                    },
                )?;
                let elapsed = start.elapsed();

                if json {
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                } else {
                    println!(
                        "Processed {} frame(s) of {} in {:.2}s",
                        summaries.len(),
                        input.display(),
                        elapsed.as_secs_f64()
                    );
                    for (window, summary) in schedule.windows().iter().zip(&summaries) {
                        print_frame(window, summary);
                    }
                }
                return Ok(());
            }

            let tstop = tstop.ok_or_else(|| {
                lmproc_core::Error::ConfigError("--tstop is required without --frames".into())
            })?;
            let window = TimeWindow::new(tstart, tstop)?;
            let shape = HistogramShape::new(&constants, &window);
            let mut buffers = HistogramBuffers::new(&shape);
            let file = ListModeFile::open(&input)?;

            let start = Instant::now();
            let summary = file.histogram(
                &window,
                &lor_map,
                &axial,
                &constants,
                &mut buffers.output(),
                &config,
            )?;
            let elapsed = start.elapsed();

            if let Some(dir) = &output_dir {
                lmproc_io::write_histograms(dir, &buffers)?;
            }
            if let Some(path) = &head_curve {
                lmproc_io::write_head_curve_csv(
                    path,
                    &buffers,
                    window.tstart(),
                    constants.tag_period_ms,
                )?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Processed {} in {:.2}s",
                    input.display(),
                    elapsed.as_secs_f64()
                );
                println!("Window: [{}, {}) ms", window.tstart(), window.tstop());
                println!("Time intervals: {}", summary.nitag);
                println!("Prompts: {}", summary.psm);
                println!("Delayeds: {}", summary.dsm);
                println!("Sinogram bins: {}", summary.tot);
                println!(
                    "Admitted: {} ({} outside axial acceptance)",
                    summary.events_admitted, summary.events_excluded
                );
                println!("Chunks: {}", summary.chunks);
                if !summary.window_closed {
                    println!("Stream ended before tstop");
                }
            }
        }

        Commands::Info { input } => {
            let file = ListModeFile::open(&input)?;
            let file_size = file.file_size();

            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Words: {}", file.word_count());

            let summary = file.summary()?;
            println!("Prompts: {}", summary.prompts);
            println!("Delayeds: {}", summary.delayeds);
            println!("Time tags: {}", summary.time_tags);
            println!("Duration: {} ms", summary.elapsed_ms);
            println!(
                "Bucket records: {} ({} singles)",
                summary.buckets, summary.singles
            );
            println!(
                "Gantry/monitor/control tags: {}/{}/{}",
                summary.gantry_tags, summary.monitor_tags, summary.control_tags
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_histogram() {
        let cli = Cli::try_parse_from([
            "lmproc",
            "-vv",
            "histogram",
            "scan.l32",
            "--lor-map",
            "lor.bin",
            "--axial-lut",
            "axial.bin",
            "--tstop",
            "60000",
            "--threads",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Histogram {
                tstart,
                tstop,
                threads,
                sequential,
                ..
            } => {
                assert_eq!(tstart, 0);
                assert_eq!(tstop, Some(60000));
                assert_eq!(threads, Some(4));
                assert!(!sequential);
            }
            Commands::Info { .. } => panic!("expected histogram command"),
        }
    }

    #[test]
    fn test_parse_frames() {
        let cli = Cli::try_parse_from([
            "lmproc",
            "histogram",
            "scan.l32",
            "--lor-map",
            "lor.bin",
            "--axial-lut",
            "axial.bin",
            "--tstart",
            "10000",
            "--frames",
            "4x15000,8x30000",
        ])
        .unwrap();
        match cli.command {
            Commands::Histogram {
                tstart,
                tstop,
                frames,
                ..
            } => {
                assert_eq!(tstop, None);
                let schedule = FrameSchedule::parse(&frames.unwrap(), tstart).unwrap();
                assert_eq!(schedule.len(), 12);
                assert_eq!(schedule.windows()[0].tstart(), 10_000);
            }
            Commands::Info { .. } => panic!("expected histogram command"),
        }
    }

    #[test]
    fn test_frames_conflict_with_tstop() {
        let result = Cli::try_parse_from([
            "lmproc",
            "histogram",
            "scan.l32",
            "--lor-map",
            "lor.bin",
            "--axial-lut",
            "axial.bin",
            "--tstop",
            "60000",
            "--frames",
            "4x15000",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tstop_required() {
        let result = Cli::try_parse_from([
            "lmproc",
            "histogram",
            "scan.l32",
            "--lor-map",
            "lor.bin",
            "--axial-lut",
            "axial.bin",
        ]);
        assert!(result.is_err());
    }
}
