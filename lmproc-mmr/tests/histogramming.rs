#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::unreadable_literal,
    clippy::float_cmp
)]
use approx::assert_relative_eq;
use lmproc_core::{
    AxialEntry, AxialLut, Error, HistogramBuffers, HistogramShape, HistogramSummary, LorBin,
    LorBinMap, MalformedReason, ScannerConstants, Span, TimeWindow,
};
use lmproc_mmr::{process_stream, EventRecord, MotionTag, ProcessorConfig};

// 4 rings of 16 crystals, 2 views x 2 bins, max ring difference 2.
fn constants() -> ScannerConstants {
    ScannerConstants {
        ncrystals: 16,
        nrings: 4,
        nbuckets: 4,
        nsangles: 2,
        nsbins: 2,
        nsn1: 16,
        nsn11: 16,
        nseg0: 7,
        max_ring_difference: 2,
        tag_period_ms: 1000,
        span: Span::One,
    }
}

// Address a: view a/2, radial a%2, crystals a and a+8.
fn lor_map() -> LorBinMap {
    LorBinMap::new(
        (0..4u16)
            .map(|a| {
                Some(LorBin {
                    view: a / 2,
                    radial: a % 2,
                    crystal_a: a,
                    crystal_b: a + 8,
                })
            })
            .collect(),
    )
}

// Ring-pair code ra * 4 + rb, one span-1 sinogram per pair.
fn axial_lut() -> AxialLut {
    let mut entries = Vec::new();
    for ring_a in 0..4u16 {
        for ring_b in 0..4u16 {
            let code = u32::from(ring_a * 4 + ring_b);
            entries.push(AxialEntry {
                ring_a,
                ring_b,
                span1: Some(code),
                span11: Some(code),
                ssrb: ring_a + ring_b,
            });
        }
    }
    AxialLut::new(entries)
}

fn lor(ring_a: u32, ring_b: u32, address: u32) -> u32 {
    (ring_a * 4 + ring_b) * 4 + address
}

fn tag(increment_ms: u32) -> EventRecord {
    EventRecord::TimeTag { increment_ms }
}

fn prompt(lor: u32) -> EventRecord {
    EventRecord::PromptCoincidence { lor }
}

fn delayed(lor: u32) -> EventRecord {
    EventRecord::DelayedCoincidence { lor }
}

fn stream(records: &[EventRecord]) -> Vec<u8> {
    records
        .iter()
        .flat_map(|r| r.encode().to_le_bytes())
        .collect()
}

fn run(
    data: &[u8],
    tstart: i64,
    tstop: i64,
    config: &ProcessorConfig,
) -> lmproc_core::Result<(HistogramBuffers, HistogramSummary)> {
    let constants = constants();
    let window = TimeWindow::new(tstart, tstop)?;
    let mut buffers = HistogramBuffers::new(&HistogramShape::new(&constants, &window));
    let summary = process_stream(
        data,
        &window,
        &lor_map(),
        &axial_lut(),
        &constants,
        &mut buffers.output(),
        config,
    )?;
    Ok((buffers, summary))
}

fn run_sequential(data: &[u8], tstart: i64, tstop: i64) -> (HistogramBuffers, HistogramSummary) {
    run(data, tstart, tstop, &ProcessorConfig::sequential()).unwrap()
}

fn parallel_config() -> ProcessorConfig {
    ProcessorConfig::default()
        .with_parallelism(4)
        .with_min_chunk_words(16)
        .with_memory_budget_bytes(1 << 30)
}

/// Deterministic mixed stream: `tags` intervals of 250 ms, each followed by
/// a burst of coincidences, singles and opaque tags.
fn synthetic_stream(tags: u32) -> Vec<u8> {
    let mut state: u32 = 12345;
    let mut next = move || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
        state >> 8
    };
    let mut records = Vec::new();
    for _ in 0..tags {
        records.push(tag(250));
        for _ in 0..40 {
            let r = next();
            let code = lor((r >> 2) % 4, (r >> 4) % 4, r % 4);
            let record = match (r >> 6) % 8 {
                0..=3 => prompt(code),
                4 | 5 => delayed(code),
                6 => EventRecord::Bucket {
                    bucket: ((r >> 9) % 4) as u16,
                    delta: (r >> 11) % 1000,
                },
                _ => EventRecord::GantryOrMotion {
                    tag: MotionTag::Gantry,
                    payload: r % 100,
                },
            };
            records.push(record);
        }
    }
    stream(&records)
}

#[test]
fn test_prompt_and_delayed_in_separate_intervals() {
    let data = stream(&[tag(1000), prompt(lor(0, 0, 0)), tag(1000), delayed(lor(1, 1, 1))]);
    let (hist, summary) = run_sequential(&data, 0, 2000);

    assert_eq!(hist.hcp, vec![1, 0]);
    assert_eq!(hist.hcd, vec![0, 1]);
    assert_eq!(summary.nitag, 2);
    assert_eq!(summary.psm, 1);
    assert_eq!(summary.dsm, 1);
    assert_eq!(summary.tot, 16 * 4);
    assert_eq!(hist.snv, vec![2, 0]);

    // Both endpoints of each coincidence reach the fan sums
    let mut fan = vec![0u32; 4 * 16];
    fan[0] = 1; // ring 0, crystal 0
    fan[8] = 1; // ring 0, crystal 8
    fan[16 + 1] = 1; // ring 1, crystal 1
    fan[16 + 9] = 1; // ring 1, crystal 9
    assert_eq!(hist.fan, fan);
    assert_eq!(hist.psn[0], 1);
    assert_eq!(hist.dsn[5 * 4 + 1], 1);
    assert!(!summary.window_closed);
}

#[test]
fn test_tag_only_stream() {
    let data = stream(&[tag(1000), tag(1000), tag(1000)]);
    let (hist, summary) = run_sequential(&data, 0, 3000);

    assert_eq!(summary.nitag, 3);
    assert_eq!(summary.psm, 0);
    assert_eq!(summary.dsm, 0);
    assert!(hist.psn.iter().all(|&v| v == 0));
    assert!(hist.hcp.iter().all(|&v| v == 0));
    assert!(hist.hcd.iter().all(|&v| v == 0));
    assert!(hist.bck.iter().all(|&v| v == 0));
    assert!(hist.fan.iter().all(|&v| v == 0));
    assert!(hist.mss.iter().all(|&v| v == 0.0));
}

#[test]
fn test_window_bounds_are_half_open() {
    let code = lor(0, 0, 0);
    let data = stream(&[
        tag(1000),
        prompt(code), // t = 0
        tag(1000),
        prompt(code), // t = 1000
        tag(1000),
        prompt(code), // t = 2000
    ]);
    let (hist, summary) = run_sequential(&data, 1000, 2000);

    assert_eq!(hist.hcp, vec![1]);
    assert_eq!(summary.psm, 1);
    assert_eq!(summary.nitag, 1);
}

#[test]
fn test_records_before_first_tag_ignored() {
    let data = stream(&[prompt(lor(0, 0, 0)), tag(1000), prompt(lor(0, 0, 1))]);
    let (hist, summary) = run_sequential(&data, 0, 1000);
    assert_eq!(summary.psm, 1);
    assert_eq!(hist.psn[1], 1);
    assert_eq!(hist.psn[0], 0);
}

#[test]
fn test_ring_difference_acceptance() {
    let data = stream(&[
        tag(1000),
        prompt(lor(0, 2, 0)), // difference 2, accepted
        prompt(lor(0, 3, 0)), // difference 3, excluded
        prompt(lor(3, 0, 1)), // difference 3, excluded
    ]);
    let (hist, summary) = run_sequential(&data, 0, 1000);

    assert_eq!(summary.psm, 1);
    assert_eq!(summary.events_admitted, 3);
    assert_eq!(summary.events_excluded, 2);
    assert_eq!(hist.psn[2 * 4], 1);
    // Excluded events still reach the head curve and fan sums
    assert_eq!(hist.hcp, vec![3]);
    assert_eq!(hist.fan.iter().sum::<u32>(), 6);
    assert_eq!(hist.fan[3 * 16 + 8], 1); // ring 3, crystal 8
}

#[test]
fn test_sums_match_sinograms() {
    let data = synthetic_stream(24);
    let (hist, summary) = run_sequential(&data, 1000, 5000);

    assert_eq!(summary.psm, hist.psn.iter().map(|&v| u64::from(v)).sum::<u64>());
    assert_eq!(summary.dsm, hist.dsn.iter().map(|&v| u64::from(v)).sum::<u64>());
    let ssr: u64 = hist.ssr.iter().map(|&v| u64::from(v)).sum();
    assert_eq!(ssr, summary.psm + summary.dsm);
    let head: u64 = hist.hcp.iter().chain(&hist.hcd).map(|&v| u64::from(v)).sum();
    let fan: u64 = hist.fan.iter().map(|&v| u64::from(v)).sum();
    assert_eq!(fan, 2 * head);
    assert_eq!(summary.nitag, 4);
    for &m in &hist.mss {
        assert!((0.0..7.0).contains(&m));
    }
}

#[test]
fn test_repeated_pass_is_idempotent() {
    let data = synthetic_stream(8);
    let constants = constants();
    let window = TimeWindow::new(0, 2000).unwrap();
    let mut buffers = HistogramBuffers::new(&HistogramShape::new(&constants, &window));
    let config = ProcessorConfig::sequential();

    let first = process_stream(
        &data,
        &window,
        &lor_map(),
        &axial_lut(),
        &constants,
        &mut buffers.output(),
        &config,
    )
    .unwrap();
    let snapshot = buffers.clone();
    let second = process_stream(
        &data,
        &window,
        &lor_map(),
        &axial_lut(),
        &constants,
        &mut buffers.output(),
        &config,
    )
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(snapshot, buffers);
}

#[test]
fn test_parallel_matches_sequential() {
    let data = synthetic_stream(40);
    let (seq, seq_summary) = run_sequential(&data, 1000, 8000);
    let (par, par_summary) = run(&data, 1000, 8000, &parallel_config()).unwrap();

    assert!(par_summary.chunks > 1);
    assert_eq!(seq_summary.chunks, 1);
    assert_eq!(seq_summary.nitag, par_summary.nitag);
    assert_eq!(seq_summary.psm, par_summary.psm);
    assert_eq!(seq_summary.dsm, par_summary.dsm);
    assert_eq!(seq_summary.records_decoded, par_summary.records_decoded);
    assert_eq!(seq_summary.events_admitted, par_summary.events_admitted);
    assert_eq!(seq_summary.events_excluded, par_summary.events_excluded);

    assert_eq!(seq.snv, par.snv);
    assert_eq!(seq.hcp, par.hcp);
    assert_eq!(seq.hcd, par.hcd);
    assert_eq!(seq.fan, par.fan);
    assert_eq!(seq.bck, par.bck);
    assert_eq!(seq.ssr, par.ssr);
    assert_eq!(seq.psn, par.psn);
    assert_eq!(seq.dsn, par.dsn);
    for (&a, &b) in seq.mss.iter().zip(&par.mss) {
        assert_relative_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn test_window_past_end_of_stream() {
    let data = synthetic_stream(4);
    let (hist, summary) = run(&data, 5000, 6000, &parallel_config()).unwrap();
    assert_eq!(summary.nitag, 0);
    assert_eq!(summary.psm, 0);
    assert!(!summary.window_closed);
    assert!(hist.bck.iter().all(|&v| v == 0));
}

#[test]
fn test_words_after_close_are_not_decoded() {
    let mut data = stream(&[tag(1000), prompt(lor(0, 0, 0)), tag(1000)]);
    data.extend_from_slice(&0xB000_0000u32.to_le_bytes());

    for config in [ProcessorConfig::sequential(), parallel_config()] {
        let (hist, summary) = run(&data, 0, 1000, &config).unwrap();
        assert!(summary.window_closed);
        assert_eq!(summary.records_decoded, 3);
        assert_eq!(summary.psm, 1);
        assert_eq!(hist.hcp, vec![1]);
    }
}

#[test]
fn test_unknown_kind_in_window() {
    let mut data = stream(&[tag(1000), prompt(lor(0, 0, 0))]);
    data.extend_from_slice(&0xB000_0000u32.to_le_bytes());

    for config in [ProcessorConfig::sequential(), parallel_config()] {
        match run(&data, 0, 1000, &config) {
            Err(Error::MalformedRecord { offset, reason, .. }) => {
                assert_eq!(offset, 8);
                assert_eq!(reason, MalformedReason::UnknownKind);
            }
            other => panic!("expected malformed record, got {other:?}"),
        }
    }
}

#[test]
fn test_ring_pair_out_of_range() {
    let data = stream(&[tag(1000), prompt(16 * 4)]);
    assert!(matches!(
        run(&data, 0, 1000, &ProcessorConfig::sequential()),
        Err(Error::MalformedRecord {
            reason: MalformedReason::RingPairOutOfRange,
            ..
        })
    ));
}

#[test]
fn test_truncated_stream() {
    let mut data = stream(&[tag(1000)]);
    data.extend_from_slice(&[0x01, 0x02]);
    assert!(matches!(
        run(&data, 0, 1000, &ProcessorConfig::sequential()),
        Err(Error::MalformedRecord {
            offset: 4,
            reason: MalformedReason::TruncatedWord,
            ..
        })
    ));
}

#[test]
fn test_size_mismatch() {
    let constants = constants();
    let window = TimeWindow::new(0, 2000).unwrap();
    let mut buffers = HistogramBuffers::new(&HistogramShape::new(&constants, &window));
    buffers.hcp.push(0);

    let result = process_stream(
        &stream(&[tag(1000)]),
        &window,
        &lor_map(),
        &axial_lut(),
        &constants,
        &mut buffers.output(),
        &ProcessorConfig::sequential(),
    );
    assert!(matches!(
        result,
        Err(Error::SizeMismatch {
            buffer: "hcp",
            expected: 2,
            actual: 3
        })
    ));
}

#[test]
fn test_bucket_singles() {
    let data = stream(&[
        tag(1000),
        EventRecord::Bucket {
            bucket: 1,
            delta: 300,
        },
        EventRecord::Bucket {
            bucket: 1,
            delta: 200,
        },
        EventRecord::Control { payload: 5 },
        EventRecord::Bucket {
            bucket: 3,
            delta: 7,
        },
    ]);
    let (hist, _) = run_sequential(&data, 0, 1000);
    assert_eq!(hist.bck, vec![0, 500, 0, 7]);
}

#[test]
fn test_bucket_total_exceeds_u32() {
    let mut records = vec![tag(1000)];
    records.extend((0..8200).map(|_| EventRecord::Bucket {
        bucket: 0,
        delta: 0x7FFFF,
    }));
    let data = stream(&records);
    let expected = 8200 * 0x7FFFFu64;
    assert!(expected > u64::from(u32::MAX));

    for config in [ProcessorConfig::sequential(), parallel_config()] {
        let (hist, summary) = run(&data, 0, 1000, &config).unwrap();
        assert_eq!(hist.bck, vec![expected, 0, 0, 0]);
        assert_eq!(summary.events_admitted, 8200);
    }
}
