use std::fmt;

use crate::runs::MIN_TANDEM_RUN;

/// Which sequence the per-length index was built over
///
/// The other sequence supplies the probe windows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, clap::ValueEnum, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum IndexSide {
    /// Index the query, probe with reference windows
    Query,
    /// Index the reference, probe with query windows
    Reference,
    /// Run both directions and merge
    #[default]
    Both,
}

impl IndexSide {
    /// The concrete directions to scan, in scan order
    #[must_use]
    pub fn directions(self) -> &'static [IndexSide] {
        match self {
            Self::Query => &[Self::Query],
            Self::Reference => &[Self::Reference],
            Self::Both => &[Self::Query, Self::Reference],
        }
    }
}

/// A repeat discovered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepeatPattern {
    /// 0-based start of the repeat in the reference
    pub reference_position: usize,
    /// Window length
    pub length: usize,
    /// Number of directly adjacent occurrences (at least 1)
    pub repeat_count: usize,
    /// Whether the match was found through the reverse complement
    pub is_reverse: bool,
    /// The reference window text
    pub original_sequence: String,
    /// 0-based start of the matching occurrence in the query
    pub query_position: usize,
    /// Sequence holding the `repeat_count` back-to-back occurrences
    pub occurrences_in: IndexSide,
}

impl RepeatPattern {
    /// Ranking score: `length * repeat_count`
    #[must_use]
    pub fn score(&self) -> usize {
        self.length * self.repeat_count
    }

    /// The `(reference_position, is_reverse)` grouping key used by the nested filter
    #[must_use]
    pub fn anchor(&self) -> (usize, bool) {
        (self.reference_position, self.is_reverse)
    }

    /// Exclusive end of the first occurrence in the reference
    #[must_use]
    pub fn end_position(&self) -> usize {
        self.reference_position + self.length
    }

    /// Start of every back-to-back occurrence, in the sequence named by
    /// `occurrences_in`
    pub fn occurrences(&self) -> impl Iterator<Item = usize> + '_ {
        let start = match self.occurrences_in {
            IndexSide::Reference => self.reference_position,
            IndexSide::Query | IndexSide::Both => self.query_position,
        };
        (0..self.repeat_count).map(move |i| start + i * self.length)
    }

    #[must_use]
    pub fn orientation_label(&self) -> &'static str {
        if self.is_reverse {
            "yes"
        } else {
            "no"
        }
    }
}

impl fmt::Display for RepeatPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "position: {}, length: {}, repeat count: {}, reverse: {}",
            self.reference_position,
            self.length,
            self.repeat_count,
            self.orientation_label()
        )
    }
}

/// Position of a candidate in a single-worker scan
///
/// Sorting merged worker output by this key reproduces the order in which a
/// sequential scan would have emitted the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ScanKey {
    pub side: IndexSide,
    pub length: usize,
    pub probe: usize,
    pub is_reverse: bool,
    pub run: usize,
}

/// A repeat tagged with its scan position
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub key: ScanKey,
    pub pattern: RepeatPattern,
}

impl Candidate {
    pub fn cap_key(&self) -> CapKey {
        CapKey {
            singleton: self.pattern.repeat_count < MIN_TANDEM_RUN,
            scan: self.key,
        }
    }
}

impl ScanKey {
    /// Smallest key a scan can produce at `probe`
    pub fn first_at(side: IndexSide, length: usize, probe: usize) -> Self {
        Self {
            side,
            length,
            probe,
            is_reverse: false,
            run: 0,
        }
    }
}

/// Order in which candidates are kept once the result cap is reached
///
/// Tandem runs come before single reverse-complement hits; each group keeps
/// its scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct CapKey {
    pub singleton: bool,
    pub scan: ScanKey,
}

impl CapKey {
    /// Smallest key that can still be produced from `scan` onwards
    pub fn lower_bound(scan: ScanKey) -> Self {
        Self {
            singleton: false,
            scan,
        }
    }
}
