//! Probing a per-length index with forward and reverse-complement windows.
//!
//! A [`Matcher`] covers one scan direction (see [`IndexSide`]). For every window
//! length it prepares a [`PreparedLength`]: the index over the indexed sequence
//! plus the rolling hashes of every probe window and of every reverse-complement
//! probe window. Scanning an offset range then needs no further hashing or
//! allocation per window.

use std::ops::Range;

use crate::error::Result;
use crate::hash::{HashScheme, WindowHasher};
use crate::index::{MatchMode, WindowIndex};
use crate::options::FinderOptions;
use crate::repeat::{Candidate, IndexSide, RepeatPattern, ScanKey};
use crate::runs::{find_runs_into, ReverseRule, Run, MIN_TANDEM_RUN};
use crate::sequence::Sequence;

/// Offsets further than this from the focus are pruned for long windows
pub const FOCUS_RADIUS: usize = 10;
/// Pruning only applies to lengths more than this far above `min_length`
pub const FOCUS_LENGTH_SLACK: usize = 10;
/// Pruning only applies to lengths above this
pub const FOCUS_LONG_WINDOW: usize = 100;

/// Region-limiting heuristic around a focus offset
///
/// For a length `L > min_length + 10` with `L > 100`, a scan over probe offsets
/// in ascending order stops at the first offset further than 10 from the focus.
/// Long windows away from the focus are therefore never examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusRegion {
    focus: usize,
    min_length: usize,
}

impl FocusRegion {
    #[must_use]
    pub fn new(focus: usize, min_length: usize) -> Self {
        Self { focus, min_length }
    }

    #[must_use]
    pub fn focus(&self) -> usize {
        self.focus
    }

    /// Whether the heuristic is active for this window length
    #[must_use]
    pub fn prunes(&self, length: usize) -> bool {
        length > self.min_length + FOCUS_LENGTH_SLACK && length > FOCUS_LONG_WINDOW
    }

    #[must_use]
    pub fn is_outside(&self, offset: usize) -> bool {
        offset.abs_diff(self.focus) > FOCUS_RADIUS
    }

    /// Exclusive bound on the probe offsets scanned for `length`
    ///
    /// Equal to the first offset where an ascending scan would stop, so any
    /// partition of `0..num_offsets` clipped to this bound scans the same set.
    #[must_use]
    pub fn scan_limit(&self, length: usize, num_offsets: usize) -> usize {
        if !self.prunes(length) {
            return num_offsets;
        }
        let first_outside = if self.focus > FOCUS_RADIUS {
            0
        } else {
            self.focus + FOCUS_RADIUS + 1
        };
        first_outside.min(num_offsets)
    }
}

/// Receiver of candidates produced by a scan
pub(crate) trait CandidateSink {
    /// Accepts a candidate; returns `false` once no more candidates are wanted
    fn push(&mut self, candidate: Candidate) -> Result<bool>;

    /// Polled before every probe offset with the smallest key that offset can
    /// produce; returning `true` ends the scan
    fn exhausted(&mut self, _next: ScanKey) -> bool {
        false
    }
}

impl CandidateSink for Vec<Candidate> {
    fn push(&mut self, candidate: Candidate) -> Result<bool> {
        self.push(candidate);
        Ok(true)
    }
}

/// How a scan over an offset range ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanOutcome {
    Completed,
    Stopped,
}

/// Everything needed to scan one window length in one direction
#[derive(Debug)]
pub struct PreparedLength {
    length: usize,
    index: WindowIndex,
    forward_hashes: Vec<u64>,
    reverse_hashes: Vec<u64>,
    limit: usize,
}

impl PreparedLength {
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Exclusive bound on the probe offsets worth scanning
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn index(&self) -> &WindowIndex {
        &self.index
    }
}

/// Scratch buffers reused across probe offsets
#[derive(Debug, Clone, Default)]
pub(crate) struct ScanBuffers {
    hits: Vec<usize>,
    runs: Vec<Run>,
}

/// Scans one direction of a query/reference pair
#[derive(Debug, Clone)]
pub struct Matcher {
    side: IndexSide,
    indexed: Sequence,
    probe: Sequence,
    probe_rc: Sequence,
    reference: Sequence,
    scheme: HashScheme,
    mode: MatchMode,
    focus: FocusRegion,
    reverse_rule: ReverseRule,
}

impl Matcher {
    /// Creates a matcher for `side`, which must be [`IndexSide::Query`] or
    /// [`IndexSide::Reference`]
    #[must_use]
    pub fn new(
        side: IndexSide,
        query: &Sequence,
        reference: &Sequence,
        options: &FinderOptions,
        focus: FocusRegion,
    ) -> Self {
        debug_assert_ne!(side, IndexSide::Both);
        let (indexed, probe) = match side {
            IndexSide::Reference => (reference.clone(), query.clone()),
            IndexSide::Query | IndexSide::Both => (query.clone(), reference.clone()),
        };
        Self {
            side,
            probe_rc: probe.reverse_complement(),
            indexed,
            probe,
            reference: reference.clone(),
            scheme: HashScheme::for_threshold(options.similarity_threshold(), options.kmer_size()),
            mode: MatchMode::from_threshold(options.similarity_threshold()),
            focus,
            reverse_rule: options.reverse_rule(),
        }
    }

    #[must_use]
    pub fn side(&self) -> IndexSide {
        self.side
    }

    /// Number of probe offsets for `length` before any pruning
    #[must_use]
    pub fn num_offsets(&self, length: usize) -> usize {
        if length > self.indexed.len() {
            0
        } else {
            self.probe.num_windows(length)
        }
    }

    /// Exclusive bound on scanned probe offsets for `length`
    #[must_use]
    pub fn scan_limit(&self, length: usize) -> usize {
        self.focus.scan_limit(length, self.num_offsets(length))
    }

    /// Builds the index and probe hashes for `length`
    ///
    /// Returns `None` when nothing would be scanned for this length.
    pub fn prepare(&self, length: usize) -> Result<Option<PreparedLength>> {
        let limit = self.scan_limit(length);
        if limit == 0 {
            return Ok(None);
        }

        let index = WindowIndex::build(&self.indexed, length, self.scheme, self.mode)?;
        let mut forward_hashes = Vec::new();
        self.scheme
            .window_hashes(&self.probe, length, &mut forward_hashes)?;
        let mut reverse_hashes = Vec::new();
        self.scheme
            .window_hashes(&self.probe_rc, length, &mut reverse_hashes)?;

        log::debug!(
            "{:?} side, length {}: {} index entries, scanning {} offsets",
            self.side,
            length,
            index.num_entries(),
            limit
        );

        Ok(Some(PreparedLength {
            length,
            index,
            forward_hashes,
            reverse_hashes,
            limit,
        }))
    }

    /// Scans probe offsets in `range` (clipped to the prepared limit)
    pub(crate) fn scan<S: CandidateSink>(
        &self,
        prepared: &PreparedLength,
        range: Range<usize>,
        buffers: &mut ScanBuffers,
        sink: &mut S,
    ) -> Result<ScanOutcome> {
        let length = prepared.length;
        let end = range.end.min(prepared.limit);
        let num_windows = self.probe.len() + 1 - length;

        for offset in range.start..end {
            if sink.exhausted(ScanKey::first_at(self.side, length, offset)) {
                return Ok(ScanOutcome::Stopped);
            }

            let window = &self.probe[offset..offset + length];
            prepared
                .index
                .lookup_hashed(window, prepared.forward_hashes[offset], &mut buffers.hits);
            if buffers.hits.len() >= MIN_TANDEM_RUN
                && !self.emit(length, offset, false, buffers, sink)?
            {
                return Ok(ScanOutcome::Stopped);
            }

            // the reverse complement of probe[offset..offset + length] in probe_rc
            let rc_offset = num_windows - 1 - offset;
            let rc_window = &self.probe_rc[rc_offset..rc_offset + length];
            prepared.index.lookup_hashed(
                rc_window,
                prepared.reverse_hashes[rc_offset],
                &mut buffers.hits,
            );
            if buffers.hits.len() >= self.reverse_rule.min_run(true)
                && !self.emit(length, offset, true, buffers, sink)?
            {
                return Ok(ScanOutcome::Stopped);
            }
        }
        Ok(ScanOutcome::Completed)
    }

    /// Splits the current hits into runs and pushes one candidate per run
    fn emit<S: CandidateSink>(
        &self,
        length: usize,
        offset: usize,
        is_reverse: bool,
        buffers: &mut ScanBuffers,
        sink: &mut S,
    ) -> Result<bool> {
        let min_run = self.reverse_rule.min_run(is_reverse);
        find_runs_into(&buffers.hits, length, min_run, &mut buffers.runs);

        for (run_idx, run) in buffers.runs.iter().enumerate() {
            let (reference_position, query_position) = match self.side {
                IndexSide::Reference => (run.start, offset),
                IndexSide::Query | IndexSide::Both => (offset, run.start),
            };
            let original =
                &self.reference[reference_position..reference_position + length];
            let candidate = Candidate {
                key: ScanKey {
                    side: self.side,
                    length,
                    probe: offset,
                    is_reverse,
                    run: run_idx,
                },
                pattern: RepeatPattern {
                    reference_position,
                    length,
                    repeat_count: run.count,
                    is_reverse,
                    original_sequence: String::from_utf8_lossy(original).into_owned(),
                    query_position,
                    occurrences_in: self.side,
                },
            };
            if !sink.push(candidate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Prepares and scans every offset of one length into `sink`
    pub(crate) fn scan_length<S: CandidateSink>(
        &self,
        length: usize,
        buffers: &mut ScanBuffers,
        sink: &mut S,
    ) -> Result<ScanOutcome> {
        match self.prepare(length)? {
            Some(prepared) => self.scan(&prepared, 0..prepared.limit, buffers, sink),
            None => Ok(ScanOutcome::Completed),
        }
    }
}
