use anyhow::Result;
use proptest::prelude::*;

use repseek::simulate::{write_pair, SimulatedPair, Simulator};
use repseek::{
    find_repeats, read_pair, write_reports, FinderOptions, IndexSide, PositionStyle, RepeatPattern,
    Sequence, Strategy as SearchStrategy, DEFAULT_MAX_REPEATS,
};

fn options(min: usize, max: usize) -> FinderOptions {
    FinderOptions::builder()
        .lengths(min, max)
        .max_repeats(1_000_000)
        .worker_count(2)
        .build()
        .unwrap()
}

fn simulated() -> SimulatedPair {
    Simulator::new(11)
        .reference_length(3000)
        .query_length(2400)
        .repeats(4)
        .unit_lengths(12, 20)
        .generate()
}

/// A 10 kb pair with five tandem blocks and five reverse-complement copies
fn simulated_10kb() -> SimulatedPair {
    Simulator::new(3)
        .reference_length(10_000)
        .query_length(10_000)
        .repeats(10)
        .generate()
}

#[test]
fn forward_tandem_in_reference() -> Result<()> {
    let reference = Sequence::from_bytes(b"ACGTACGTACGT");
    let query = Sequence::from_bytes(b"ACGT");
    let repeats = find_repeats(&query, &reference, &options(4, 4))?;

    assert!(repeats.iter().any(|r| r.reference_position == 0
        && r.length == 4
        && !r.is_reverse
        && r.repeat_count >= 2));
    Ok(())
}

#[test]
fn reverse_complement_in_reference() -> Result<()> {
    let reference = Sequence::from_bytes(b"GGGGCCCC");
    let query = Sequence::from_bytes(b"GGGG");
    let repeats = find_repeats(&query, &reference, &options(4, 4))?;

    assert!(repeats
        .iter()
        .any(|r| r.is_reverse && r.reference_position == 4 && r.original_sequence == "CCCC"));
    Ok(())
}

#[test]
fn planted_repeats_are_reported() -> Result<()> {
    let pair = simulated();
    let repeats = find_repeats(&pair.query, &pair.reference, &options(12, 20))?;

    for planted in &pair.planted {
        let unit_len = planted.unit.len();
        let found = repeats.iter().any(|r| {
            r.reference_position == planted.reference_position
                && r.is_reverse == planted.is_reverse
                && r.length >= unit_len
                && r.repeat_count >= planted.copies
        });
        assert!(found, "planted repeat not reported: {planted:?}");
    }
    Ok(())
}

#[test]
fn strategies_and_worker_counts_agree() -> Result<()> {
    let pair = simulated();
    let baseline = find_repeats(
        &pair.query,
        &pair.reference,
        &options(12, 20).into_builder().worker_count(1).build()?,
    )?;

    for strategy in [SearchStrategy::ByLength, SearchStrategy::ByOffset] {
        for workers in [1, 2, 4] {
            let opts = options(12, 20)
                .into_builder()
                .strategy(strategy)
                .worker_count(workers)
                .build()?;
            let repeats = find_repeats(&pair.query, &pair.reference, &opts)?;
            assert_eq!(repeats, baseline, "{strategy:?} with {workers} workers");
        }
    }
    Ok(())
}

#[test]
fn repeated_runs_are_identical() -> Result<()> {
    let pair = simulated();
    let opts = options(12, 20).into_builder().worker_count(4).build()?;
    let first = find_repeats(&pair.query, &pair.reference, &opts)?;
    for _ in 0..3 {
        assert_eq!(find_repeats(&pair.query, &pair.reference, &opts)?, first);
    }
    Ok(())
}

#[test]
fn query_direction_alone_finds_reverse_complements() -> Result<()> {
    let pair = simulated();
    let opts = options(12, 20)
        .into_builder()
        .index_side(IndexSide::Query)
        .build()?;
    let repeats = find_repeats(&pair.query, &pair.reference, &opts)?;
    for planted in pair.planted.iter().filter(|p| p.is_reverse) {
        assert!(repeats
            .iter()
            .any(|r| r.is_reverse && r.reference_position == planted.reference_position));
    }
    Ok(())
}

#[test]
fn default_options_keep_planted_tandem_blocks() -> Result<()> {
    let pair = simulated_10kb();
    let repeats = find_repeats(&pair.query, &pair.reference, &FinderOptions::default())?;
    assert!(repeats.len() <= DEFAULT_MAX_REPEATS);

    let tandem: Vec<_> = pair.planted.iter().filter(|p| !p.is_reverse).collect();
    assert_eq!(tandem.len(), 5);
    for planted in tandem {
        assert!(
            repeats.iter().any(|r| planted.is_detected_by(r)),
            "planted tandem block not reported: {planted:?}"
        );
    }
    Ok(())
}

#[test]
fn capped_results_do_not_depend_on_workers() -> Result<()> {
    let pair = simulated_10kb();
    let capped = |strategy: SearchStrategy, workers: usize| {
        FinderOptions::builder()
            .lengths(10, 40)
            .max_repeats(300)
            .strategy(strategy)
            .worker_count(workers)
            .build()
    };
    let baseline = find_repeats(&pair.query, &pair.reference, &capped(SearchStrategy::ByLength, 1)?)?;
    assert!(!baseline.is_empty() && baseline.len() <= 300);

    for (strategy, workers) in [
        (SearchStrategy::ByLength, 4),
        (SearchStrategy::ByOffset, 4),
        (SearchStrategy::ByLength, 0),
    ] {
        let repeats = find_repeats(&pair.query, &pair.reference, &capped(strategy, workers)?)?;
        assert_eq!(repeats, baseline, "{strategy:?} with {workers} workers");
    }
    for planted in pair.planted.iter().filter(|p| !p.is_reverse) {
        assert!(baseline.iter().any(|r| planted.is_detected_by(r)));
    }
    Ok(())
}

#[test]
fn files_in_reports_out() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pair = simulated();
    write_pair(dir.path(), &pair)?;

    let (reference, query) = read_pair(dir.path().join("reference.txt"), dir.path().join("query.txt"))?;
    assert_eq!(reference, pair.reference);
    assert_eq!(query, pair.query);

    let repeats = find_repeats(&query, &reference, &options(12, 20))?;
    let paths = write_reports(&dir.path().join("out"), &repeats, PositionStyle::End)?;

    let csv = std::fs::read_to_string(&paths.csv)?;
    assert_eq!(csv.lines().count(), repeats.len() + 1);
    let first_row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(first_row[0], repeats[0].end_position().to_string());
    assert_eq!(first_row[4], repeats[0].original_sequence);

    let details = std::fs::read_to_string(&paths.details)?;
    assert_eq!(details.matches("Repeat #").count(), repeats.len());
    Ok(())
}

/// Whether `unit` is not a power of a shorter word
fn is_primitive(unit: &[u8]) -> bool {
    let n = unit.len();
    (1..n)
        .filter(|p| n % p == 0)
        .all(|p| unit.chunks(p).any(|c| c != &unit[..p]))
}

fn check_ranked(repeats: &[RepeatPattern]) {
    for pair in repeats.windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tandem_self_repeat_found_at_origin(
        unit in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 4..9),
        copies in 2usize..6,
    ) {
        prop_assume!(is_primitive(&unit));
        let seq = Sequence::from_bytes(&unit.repeat(copies));
        let repeats = find_repeats(&seq, &seq, &options(unit.len(), unit.len())).unwrap();
        check_ranked(&repeats);
        prop_assert!(repeats.iter().any(|r| r.reference_position == 0
            && r.length == unit.len()
            && !r.is_reverse
            && r.repeat_count == copies));
    }
}
