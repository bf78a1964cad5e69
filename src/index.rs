//! Per-length window index.
//!
//! A [`WindowIndex`] maps the content of every window of one fixed length to the
//! ascending list of offsets where that content (or, under fuzzy matching, its
//! near-duplicate class) starts. It is built once per window length over a
//! single sequence and dropped when the search moves on to the next length.
//!
//! Buckets are keyed by a window hash and hold a short chain of entries. Each
//! entry remembers the offset of its representative window so content can be
//! compared against the indexed sequence directly, without copying windows.

use std::collections::HashMap;

use crate::error::{Result, SearchError};
use crate::hash::{HashScheme, WindowHasher};
use crate::sequence::Sequence;

/// Fraction of positions at which `a` and `b` carry the same base
///
/// Windows of different length never match and yield `0.0`.
#[must_use]
pub fn similarity(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return if a.is_empty() && b.is_empty() { 1.0 } else { 0.0 };
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x == y).count();
    matches as f64 / a.len() as f64
}

/// How bucket entries are compared against a probe window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchMode {
    /// Byte-identical content only
    Exact,
    /// Any entry whose representative matches at least this fraction of bases
    Fuzzy(f64),
}

impl MatchMode {
    #[must_use]
    pub fn from_threshold(similarity_threshold: f64) -> Self {
        if similarity_threshold >= 1.0 {
            Self::Exact
        } else {
            Self::Fuzzy(similarity_threshold)
        }
    }

    #[inline]
    fn accepts(self, representative: &[u8], probe: &[u8]) -> bool {
        match self {
            Self::Exact => representative == probe,
            Self::Fuzzy(threshold) => similarity(representative, probe) >= threshold,
        }
    }
}

/// A chain link inside a bucket
#[derive(Debug, Clone)]
struct Entry {
    /// Offset of the first window that created this entry
    representative: usize,
    /// Every offset assigned to this entry, in insertion (ascending) order
    positions: Vec<usize>,
}

/// Index of every window of one length over one sequence
#[derive(Debug, Clone)]
pub struct WindowIndex {
    sequence: Sequence,
    window: usize,
    scheme: HashScheme,
    mode: MatchMode,
    buckets: HashMap<u64, Vec<Entry>>,
    num_entries: usize,
}

impl WindowIndex {
    /// Builds the index over every window of length `window` in `sequence`
    ///
    /// A sequence shorter than `window` (or a zero window) yields an empty index.
    pub fn build(
        sequence: &Sequence,
        window: usize,
        scheme: HashScheme,
        mode: MatchMode,
    ) -> Result<Self> {
        let mut index = Self {
            sequence: sequence.clone(),
            window,
            scheme,
            mode,
            buckets: HashMap::new(),
            num_entries: 0,
        };

        let n = sequence.num_windows(window);
        if n == 0 {
            return Ok(index);
        }

        let mut hashes = Vec::new();
        scheme.window_hashes(sequence, window, &mut hashes)?;
        index
            .buckets
            .try_reserve(n)
            .map_err(|_| SearchError::allocation("window index buckets", n))?;

        for (offset, &hash) in hashes.iter().enumerate() {
            index.insert(hash, offset)?;
        }
        Ok(index)
    }

    fn insert(&mut self, hash: u64, offset: usize) -> Result<()> {
        let seq = self.sequence.as_bytes();
        let window = self.window;
        let content = &seq[offset..offset + window];
        let chain = self.buckets.entry(hash).or_default();

        let existing = chain.iter_mut().find(|entry| {
            let rep = &seq[entry.representative..entry.representative + window];
            self.mode.accepts(rep, content)
        });

        match existing {
            Some(entry) => {
                entry
                    .positions
                    .try_reserve(1)
                    .map_err(|_| SearchError::allocation("index positions", 1))?;
                entry.positions.push(offset);
            }
            None => {
                chain.push(Entry {
                    representative: offset,
                    positions: vec![offset],
                });
                self.num_entries += 1;
            }
        }
        Ok(())
    }

    /// Collects the offsets matching `probe` into `out`, ascending
    ///
    /// `hash` must be the hash of `probe` under this index's scheme. The buffer is
    /// cleared first. Returns the number of positions found.
    pub fn lookup_hashed(&self, probe: &[u8], hash: u64, out: &mut Vec<usize>) -> usize {
        out.clear();
        if probe.len() != self.window {
            return 0;
        }
        let Some(chain) = self.buckets.get(&hash) else {
            return 0;
        };

        let seq = self.sequence.as_bytes();
        let mut merged_entries = 0;
        for entry in chain {
            let rep = &seq[entry.representative..entry.representative + self.window];
            if self.mode.accepts(rep, probe) {
                out.extend_from_slice(&entry.positions);
                merged_entries += 1;
                if self.mode == MatchMode::Exact {
                    break;
                }
            }
        }

        // several fuzzy classes may answer one probe; restore ascending order
        if merged_entries > 1 {
            out.sort_unstable();
        }
        out.len()
    }

    /// Hashes `probe` and collects its matching offsets into `out`
    pub fn lookup(&self, probe: &[u8], out: &mut Vec<usize>) -> usize {
        let hash = self.scheme.hash_window(probe);
        self.lookup_hashed(probe, hash, out)
    }

    /// The window length this index was built for
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// The hashing scheme used for bucket selection
    #[must_use]
    pub fn scheme(&self) -> &HashScheme {
        &self.scheme
    }

    /// The indexed sequence
    #[must_use]
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Number of distinct content classes
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }
}
