//! The repeat search entry point.
//!
//! [`RepeatFinder`] fans the `(length, probe offset)` space out over worker
//! threads, collects their candidates into one shared list and reduces it to the
//! final ranked set.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::{Result, SearchError};
use crate::filter::{dedup_repeats, filter_nested, rank};
use crate::matcher::{CandidateSink, FocusRegion, Matcher, ScanBuffers, ScanOutcome};
use crate::options::{FinderOptions, Strategy};
use crate::parallel::{length_units, offset_units, process_parallel, ParallelProcessor, WorkUnit};
use crate::repeat::{CapKey, Candidate, RepeatPattern, ScanKey};
use crate::sequence::Sequence;

/// Number of offset polls between refreshes of a sink's cached cap bound
const BOUND_REFRESH: usize = 256;

/// Keeps the keys of the `cap` best candidates any worker has produced
///
/// Candidates compete by [`CapKey`], so the kept set is the `cap` smallest keys
/// of everything a full scan emits, whatever the schedule.
#[derive(Debug)]
struct CapGate {
    cap: usize,
    kept: Mutex<BinaryHeap<CapKey>>,
    full: AtomicBool,
}

impl CapGate {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            kept: Mutex::new(BinaryHeap::new()),
            full: AtomicBool::new(false),
        }
    }

    /// Records `key`; returns `false` when `cap` better keys are already kept
    fn admit(&self, key: CapKey) -> Result<bool> {
        let mut kept = self.kept.lock();
        if kept.len() < self.cap {
            kept.try_reserve(1)
                .map_err(|_| SearchError::allocation("result cap", 1))?;
            kept.push(key);
            if kept.len() == self.cap {
                self.full.store(true, Ordering::Release);
            }
            return Ok(true);
        }
        match kept.peek() {
            Some(&worst) if key < worst => {
                kept.pop();
                kept.push(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Worst kept key, once the cap is reached
    fn bound(&self) -> Option<CapKey> {
        if !self.is_full() {
            return None;
        }
        self.kept.lock().peek().copied()
    }

    fn is_full(&self) -> bool {
        self.full.load(Ordering::Acquire)
    }

    /// Whether nothing scanned from `key` onwards can still be kept
    fn is_past(&self, key: ScanKey) -> bool {
        self.bound()
            .is_some_and(|bound| CapKey::lower_bound(key) > bound)
    }
}

/// State shared by every worker of one search
#[derive(Debug, Clone)]
struct SharedResults {
    candidates: Arc<Mutex<Vec<Candidate>>>,
    gate: Arc<CapGate>,
    stop: Arc<AtomicBool>,
}

impl SharedResults {
    fn new(cap: usize) -> Self {
        Self {
            candidates: Arc::new(Mutex::new(Vec::new())),
            gate: Arc::new(CapGate::new(cap)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn take(&self) -> Vec<Candidate> {
        std::mem::take(&mut *self.candidates.lock())
    }
}

/// Thread-local sink enforcing the global candidate cap
///
/// The cached bound only ever lags behind the shared one, which can end a scan
/// later than necessary but never too early.
struct CappedSink<'a> {
    local: &'a mut Vec<Candidate>,
    shared: &'a SharedResults,
    bound: Option<CapKey>,
    polls: usize,
}

impl<'a> CappedSink<'a> {
    fn new(local: &'a mut Vec<Candidate>, shared: &'a SharedResults) -> Self {
        Self {
            local,
            bound: shared.gate.bound(),
            shared,
            polls: 0,
        }
    }
}

impl CandidateSink for CappedSink<'_> {
    fn push(&mut self, candidate: Candidate) -> Result<bool> {
        if !self.shared.gate.admit(candidate.cap_key())? {
            self.bound = self.shared.gate.bound();
            return Ok(true);
        }
        self.local
            .try_reserve(1)
            .map_err(|_| SearchError::allocation("candidate buffer", 1))?;
        self.local.push(candidate);
        Ok(!self.shared.stopped())
    }

    fn exhausted(&mut self, next: ScanKey) -> bool {
        if self.shared.stopped() {
            return true;
        }
        self.polls += 1;
        if self.polls % BOUND_REFRESH == 0 {
            self.bound = self.shared.gate.bound();
        }
        self.bound
            .is_some_and(|bound| CapKey::lower_bound(next) > bound)
    }
}

/// Worker-side processor: scans its units into a local buffer and flushes the
/// buffer into the shared list after every unit
#[derive(Clone)]
struct ScanProcessor {
    matchers: Arc<[Matcher]>,
    shared: SharedResults,
    local: Vec<Candidate>,
    buffers: ScanBuffers,
    tid: Option<usize>,
}

impl ScanProcessor {
    fn new(matchers: Arc<[Matcher]>, shared: SharedResults) -> Self {
        Self {
            matchers,
            shared,
            local: Vec::new(),
            buffers: ScanBuffers::default(),
            tid: None,
        }
    }
}

impl ParallelProcessor for ScanProcessor {
    fn process_unit(&mut self, unit: &WorkUnit) -> Result<()> {
        let matchers = Arc::clone(&self.matchers);
        let Some(matcher) = matchers.iter().find(|m| m.side() == unit.side()) else {
            return Ok(());
        };
        let mut sink = CappedSink::new(&mut self.local, &self.shared);

        match unit {
            WorkUnit::Lengths { lengths, .. } => {
                for length in lengths.clone() {
                    if sink.exhausted(ScanKey::first_at(matcher.side(), length, 0))
                        || matcher.scan_length(length, &mut self.buffers, &mut sink)?
                            == ScanOutcome::Stopped
                    {
                        break;
                    }
                }
            }
            WorkUnit::Offsets {
                prepared, offsets, ..
            } => {
                matcher.scan(prepared, offsets.clone(), &mut self.buffers, &mut sink)?;
            }
        }
        Ok(())
    }

    fn on_batch_complete(&mut self) -> Result<()> {
        if let Some(bound) = self.shared.gate.bound() {
            self.local.retain(|c| c.cap_key() <= bound);
        }
        if self.local.is_empty() {
            return Ok(());
        }
        let mut candidates = self.shared.candidates.lock();
        candidates
            .try_reserve(self.local.len())
            .map_err(|_| SearchError::allocation("merged candidates", self.local.len()))?;
        log::trace!(
            "worker {:?} flushing {} candidates",
            self.tid,
            self.local.len()
        );
        candidates.append(&mut self.local);
        Ok(())
    }

    fn set_tid(&mut self, tid: usize) {
        self.tid = Some(tid);
    }

    fn get_tid(&self) -> Option<usize> {
        self.tid
    }
}

/// Reduces merged worker output to the final ranked list
///
/// Only the `max_repeats` candidates with the smallest [`CapKey`] take part.
/// They are put back into the order a single worker would have produced them,
/// so duplicate elimination and the nested filter see the same sequence
/// regardless of scheduling.
pub(crate) fn merge_candidates(
    mut candidates: Vec<Candidate>,
    max_repeats: usize,
) -> Vec<RepeatPattern> {
    if candidates.len() > max_repeats {
        candidates.select_nth_unstable_by_key(max_repeats, Candidate::cap_key);
        candidates.truncate(max_repeats);
    }
    candidates.sort_by_key(|c| c.key);
    let patterns = candidates.into_iter().map(|c| c.pattern).collect();
    let mut repeats = filter_nested(dedup_repeats(patterns));
    rank(&mut repeats);
    repeats.truncate(max_repeats);
    repeats
}

/// Searches a query/reference pair for forward, tandem and reverse-complement repeats
#[derive(Debug, Clone)]
pub struct RepeatFinder {
    options: FinderOptions,
}

impl RepeatFinder {
    /// Creates a finder after validating `options`
    pub fn new(options: FinderOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    #[must_use]
    pub fn options(&self) -> &FinderOptions {
        &self.options
    }

    /// Runs the search and returns repeats ranked by `length * repeat_count`
    ///
    /// Empty inputs, or a length range that fits neither sequence, give an empty
    /// result. Reaching the result cap is not an error: tandem runs are kept
    /// first, then the earliest windows, and work that cannot improve on the
    /// kept set is skipped.
    pub fn find(&self, query: &Sequence, reference: &Sequence) -> Result<Vec<RepeatPattern>> {
        let start = Instant::now();
        let options = &self.options;

        if query.is_empty() || reference.is_empty() {
            log::debug!("empty input, nothing to search");
            return Ok(Vec::new());
        }
        let Some((min_length, max_length)) = options.length_range(query, reference) else {
            log::debug!(
                "no window length in [{}, {}] fits query ({}) and reference ({})",
                options.min_length(),
                options.max_length(),
                query.len(),
                reference.len()
            );
            return Ok(Vec::new());
        };

        let focus = FocusRegion::new(options.resolve_focus(query), options.min_length());
        let sides = options.index_side().directions();
        let matchers: Arc<[Matcher]> = sides
            .iter()
            .map(|&side| Matcher::new(side, query, reference, options, focus))
            .collect::<Vec<_>>()
            .into();
        let num_workers = options.effective_workers();
        log::debug!(
            "searching lengths {min_length}..={max_length} with {num_workers} workers ({:?}, {:?}, focus {})",
            options.strategy(),
            options.index_side(),
            focus.focus()
        );

        let shared = SharedResults::new(options.max_repeats());
        let processor = ScanProcessor::new(Arc::clone(&matchers), shared.clone());
        match options.strategy() {
            Strategy::ByLength => {
                let units = length_units(sides, min_length, max_length, num_workers);
                process_parallel(units, processor, num_workers, &shared.stop)?;
            }
            Strategy::ByOffset => {
                'directions: for matcher in matchers.iter() {
                    for length in min_length..=max_length {
                        if shared.stopped()
                            || shared
                                .gate
                                .is_past(ScanKey::first_at(matcher.side(), length, 0))
                        {
                            break 'directions;
                        }
                        let Some(prepared) = matcher.prepare(length)? else {
                            continue;
                        };
                        let units = offset_units(matcher.side(), &Arc::new(prepared), num_workers);
                        process_parallel(units, processor.clone(), num_workers, &shared.stop)?;
                    }
                }
            }
        }

        if shared.gate.is_full() {
            log::warn!(
                "result cap of {} candidates reached, keeping tandem runs first and then the earliest windows",
                options.max_repeats()
            );
        }
        let candidates = shared.take();
        let num_candidates = candidates.len();
        let repeats = merge_candidates(candidates, options.max_repeats());
        log::info!(
            "found {} repeats ({} candidates) in {:.2?}",
            repeats.len(),
            num_candidates,
            start.elapsed()
        );
        Ok(repeats)
    }
}

/// Runs a single search with `options`
///
/// ```rust
/// use repseek::{find_repeats, FinderOptions, Sequence};
///
/// let reference = Sequence::from_bytes(b"ACGTACGTACGT");
/// let query = Sequence::from_bytes(b"ACGT");
/// let options = FinderOptions::builder().lengths(4, 4).build().unwrap();
///
/// let repeats = find_repeats(&query, &reference, &options).unwrap();
/// assert_eq!(repeats[0].reference_position, 0);
/// assert!(repeats[0].repeat_count >= 2);
/// ```
pub fn find_repeats(
    query: &Sequence,
    reference: &Sequence,
    options: &FinderOptions,
) -> Result<Vec<RepeatPattern>> {
    RepeatFinder::new(options.clone())?.find(query, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};
    use crate::repeat::IndexSide;
    use crate::runs::ReverseRule;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn random_bases(rng: &mut SmallRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
    }

    fn options(min: usize, max: usize) -> FinderOptions {
        FinderOptions::builder()
            .lengths(min, max)
            .worker_count(1)
            .build()
            .unwrap()
    }

    /// A random reference with a planted tandem unit and a planted reverse complement
    fn planted_pair() -> (Sequence, Sequence) {
        let mut rng = SmallRng::seed_from_u64(42);
        let unit = random_bases(&mut rng, 14);
        let island = random_bases(&mut rng, 22);

        let mut reference = random_bases(&mut rng, 150);
        reference.extend_from_slice(&unit.repeat(3));
        reference.extend(random_bases(&mut rng, 60));
        reference.extend(crate::sequence::reverse_complement(&island));
        reference.extend(random_bases(&mut rng, 90));

        let mut query = random_bases(&mut rng, 80);
        query.extend_from_slice(&unit);
        query.extend(random_bases(&mut rng, 40));
        query.extend_from_slice(&island);
        query.extend(random_bases(&mut rng, 50));

        (Sequence::from_bytes(&query), Sequence::from_bytes(&reference))
    }

    #[test]
    fn test_forward_tandem_scenario() -> Result<()> {
        let reference = Sequence::from_bytes(b"ACGTACGTACGT");
        let query = Sequence::from_bytes(b"ACGT");
        let repeats = find_repeats(&query, &reference, &options(4, 4))?;

        let top = &repeats[0];
        assert_eq!(top.reference_position, 0);
        assert_eq!(top.length, 4);
        assert!(!top.is_reverse);
        assert!(top.repeat_count >= 2);
        Ok(())
    }

    #[test]
    fn test_reverse_complement_scenario() -> Result<()> {
        let reference = Sequence::from_bytes(b"GGGGCCCC");
        let query = Sequence::from_bytes(b"GGGG");
        let repeats = find_repeats(&query, &reference, &options(4, 4))?;

        assert_eq!(
            repeats,
            vec![RepeatPattern {
                reference_position: 4,
                length: 4,
                repeat_count: 1,
                is_reverse: true,
                original_sequence: "CCCC".to_string(),
                query_position: 0,
                occurrences_in: IndexSide::Query,
            }]
        );
        Ok(())
    }

    #[test]
    fn test_tandem_only_drops_reverse_singletons() -> Result<()> {
        let reference = Sequence::from_bytes(b"GGGGCCCC");
        let query = Sequence::from_bytes(b"GGGG");
        let opts = options(4, 4)
            .into_builder()
            .reverse_rule(ReverseRule::TandemOnly)
            .build()?;
        assert!(find_repeats(&query, &reference, &opts)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_self_repeat() -> Result<()> {
        let seq = Sequence::from_bytes(&b"ACCGT".repeat(4));
        let repeats = find_repeats(&seq, &seq, &options(3, 8))?;
        assert!(repeats.iter().any(|r| r.reference_position == 0
            && r.length == 5
            && !r.is_reverse
            && r.repeat_count >= 2));
        Ok(())
    }

    #[test]
    fn test_planted_repeats_found() -> Result<()> {
        let (query, reference) = planted_pair();
        let repeats = find_repeats(&query, &reference, &options(10, 20))?;

        // the 14-base unit occurs three times back to back at reference offset 150
        assert!(repeats
            .iter()
            .any(|r| r.reference_position == 150 && r.length == 14 && r.repeat_count == 3));
        // the 22-base island appears reverse complemented at reference offset 252
        assert!(repeats
            .iter()
            .any(|r| r.is_reverse && r.reference_position >= 252 && r.reference_position < 274));
        Ok(())
    }

    #[test]
    fn test_output_invariants() -> Result<()> {
        let (query, reference) = planted_pair();
        let repeats = find_repeats(&query, &reference, &options(8, 24))?;

        let mut anchors = HashSet::new();
        for r in &repeats {
            assert!(anchors.insert(r.anchor()));
            assert!(r.repeat_count >= 1);
            assert_eq!(
                r.original_sequence.as_bytes(),
                &reference[r.reference_position..r.end_position()]
            );
        }
        for pair in repeats.windows(2) {
            assert!(pair[0].score() >= pair[1].score());
        }
        Ok(())
    }

    #[test]
    fn test_strategies_and_worker_counts_agree() -> Result<()> {
        let (query, reference) = planted_pair();
        let baseline = find_repeats(&query, &reference, &options(8, 24))?;
        assert!(!baseline.is_empty());

        for strategy in [Strategy::ByLength, Strategy::ByOffset] {
            for workers in [1, 2, 3, 8] {
                let opts = options(8, 24)
                    .into_builder()
                    .strategy(strategy)
                    .worker_count(workers)
                    .build()?;
                assert_eq!(find_repeats(&query, &reference, &opts)?, baseline);
            }
        }
        Ok(())
    }

    #[test]
    fn test_single_direction_is_subset() -> Result<()> {
        let (query, reference) = planted_pair();
        let both = find_repeats(&query, &reference, &options(10, 20))?;
        for side in [IndexSide::Query, IndexSide::Reference] {
            let opts = options(10, 20).into_builder().index_side(side).build()?;
            for r in find_repeats(&query, &reference, &opts)? {
                assert!(both.iter().any(|b| b.anchor() == r.anchor() && b.length >= r.length));
            }
        }
        Ok(())
    }

    #[test]
    fn test_focus_prunes_long_windows() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        let unit = random_bases(&mut rng, 120);
        let seq = Sequence::from_bytes(&unit.repeat(2));

        let near = options(105, 120).into_builder().focus_offset(0).build()?;
        let repeats = find_repeats(&seq, &seq, &near)?;
        assert!(repeats
            .iter()
            .any(|r| r.reference_position == 0 && r.length == 120 && r.repeat_count == 2));

        let far = options(105, 120).into_builder().focus_offset(200).build()?;
        let repeats = find_repeats(&seq, &seq, &far)?;
        assert!(repeats.iter().all(|r| r.length <= 115));
        Ok(())
    }

    #[test]
    fn test_result_cap_truncates() -> Result<()> {
        let seq = Sequence::from_bytes(&b"ACGTTGCA".repeat(12));
        let opts = options(4, 40).into_builder().max_repeats(3).build()?;
        let repeats = find_repeats(&seq, &seq, &opts)?;
        assert!(!repeats.is_empty());
        assert!(repeats.len() <= 3);
        Ok(())
    }

    #[test]
    fn test_empty_and_oversized_inputs() -> Result<()> {
        let empty = Sequence::from_bytes(b"");
        let seq = Sequence::from_bytes(b"ACGTACGT");
        assert!(find_repeats(&empty, &seq, &options(4, 4))?.is_empty());
        assert!(find_repeats(&seq, &empty, &options(4, 4))?.is_empty());
        assert!(find_repeats(&seq, &seq, &options(9, 20))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_options() {
        let bad = FinderOptions::default()
            .into_builder()
            .max_repeats(0)
            .build();
        assert!(matches!(
            bad,
            Err(Error::ConfigError(ConfigError::ZeroMaxRepeats))
        ));
    }

    #[test]
    fn test_merge_restores_scan_order() {
        let candidate = |probe: usize, count: usize| Candidate {
            key: ScanKey {
                side: IndexSide::Query,
                length: 4,
                probe,
                is_reverse: false,
                run: 0,
            },
            pattern: RepeatPattern {
                reference_position: 8,
                length: 4,
                repeat_count: count,
                is_reverse: false,
                original_sequence: "ACGT".to_string(),
                query_position: probe,
                occurrences_in: IndexSide::Query,
            },
        };
        // the same repeat emitted by two probes; the earlier probe must win
        let merged = merge_candidates(vec![candidate(9, 3), candidate(2, 2)], 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].query_position, 2);
    }

    fn key(length: usize, probe: usize, singleton: bool) -> CapKey {
        CapKey {
            singleton,
            scan: ScanKey::first_at(IndexSide::Query, length, probe),
        }
    }

    #[test]
    fn test_cap_gate_keeps_smallest_keys_in_any_order() -> Result<()> {
        let mut keys: Vec<CapKey> = (0..40)
            .map(|i| key(10 + i % 7, i, i % 3 == 0))
            .collect();
        let mut expected = keys.clone();
        expected.sort();
        expected.truncate(5);

        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..4 {
            let gate = CapGate::new(5);
            for &k in &keys {
                gate.admit(k)?;
            }
            assert!(gate.is_full());
            assert_eq!(gate.bound(), expected.last().copied());
            let kept = gate.kept.lock().clone().into_sorted_vec();
            assert_eq!(kept, expected);

            let j = rng.random_range(0..keys.len());
            keys.swap(0, j);
            keys.reverse();
        }
        Ok(())
    }

    #[test]
    fn test_cap_gate_only_passes_keys_behind_a_full_set() -> Result<()> {
        let gate = CapGate::new(2);
        assert!(!gate.is_past(ScanKey::first_at(IndexSide::Reference, 100, 0)));
        gate.admit(key(10, 5, false))?;
        gate.admit(key(10, 9, true))?;
        // a singleton bound never ends a scan that may still find tandem runs
        assert!(!gate.is_past(ScanKey::first_at(IndexSide::Reference, 100, 0)));

        gate.admit(key(12, 0, false))?;
        assert!(!gate.is_past(ScanKey::first_at(IndexSide::Query, 12, 0)));
        assert!(gate.is_past(ScanKey::first_at(IndexSide::Query, 12, 1)));
        assert!(!gate.admit(key(11, 0, true))?);
        Ok(())
    }

    #[test]
    fn test_cap_prefers_tandem_runs_over_reverse_singletons() -> Result<()> {
        let (query, reference) = planted_pair();
        let opts = options(10, 20).into_builder().max_repeats(5).build()?;
        let repeats = find_repeats(&query, &reference, &opts)?;

        assert!(repeats.len() <= 5);
        assert!(repeats
            .iter()
            .any(|r| r.reference_position == 150 && r.length == 14 && r.repeat_count == 3));
        Ok(())
    }

    #[test]
    fn test_capped_output_is_independent_of_schedule() -> Result<()> {
        let (query, reference) = planted_pair();
        let capped = |strategy: Strategy, workers: usize| {
            options(8, 24)
                .into_builder()
                .max_repeats(7)
                .strategy(strategy)
                .worker_count(workers)
                .build()
        };
        let baseline = find_repeats(&query, &reference, &capped(Strategy::ByLength, 1)?)?;
        assert!(!baseline.is_empty() && baseline.len() <= 7);

        for strategy in [Strategy::ByLength, Strategy::ByOffset] {
            for workers in [1, 2, 3, 8] {
                let opts = capped(strategy, workers)?;
                for _ in 0..3 {
                    assert_eq!(find_repeats(&query, &reference, &opts)?, baseline);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_merge_keeps_capped_candidates_by_cap_key() {
        let candidate = |length: usize, count: usize, rev: bool| Candidate {
            key: ScanKey {
                side: IndexSide::Query,
                length,
                probe: 0,
                is_reverse: rev,
                run: 0,
            },
            pattern: RepeatPattern {
                reference_position: length,
                length,
                repeat_count: count,
                is_reverse: rev,
                original_sequence: "A".repeat(length),
                query_position: 0,
                occurrences_in: IndexSide::Query,
            },
        };
        let merged = merge_candidates(
            vec![candidate(10, 1, true), candidate(11, 1, true), candidate(30, 2, false)],
            2,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].length, 30);
        assert_eq!(merged[1].length, 10);
    }
}
