//! Search options and their validation.

use crate::error::{ConfigError, Result};
use crate::hash::DEFAULT_KMER_SIZE;
use crate::parallel::resolve_threads;
use crate::repeat::IndexSide;
use crate::runs::ReverseRule;
use crate::sequence::Sequence;

/// Shortest window length searched by default
pub const DEFAULT_MIN_LENGTH: usize = 10;
/// Longest window length searched by default
pub const DEFAULT_MAX_LENGTH: usize = 120;
/// Shortest window length of the fuzzy preset
pub const FUZZY_MIN_LENGTH: usize = 50;
/// Longest window length of the fuzzy preset
pub const FUZZY_MAX_LENGTH: usize = 101;
/// Cap on emitted candidates
pub const DEFAULT_MAX_REPEATS: usize = 1000;
/// Exact matching
pub const DEFAULT_SIMILARITY: f64 = 1.0;
/// Similarity threshold of the fuzzy preset
pub const FUZZY_SIMILARITY: f64 = 0.99;
/// Environment variable overriding the focus offset
pub const FOCUS_ENV_VAR: &str = "SPECIAL_CHECK_AREA";

/// How the `(length, offset)` search space is split between workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize)]
pub enum Strategy {
    /// Each work unit is a contiguous range of window lengths with its own index
    #[default]
    #[value(name = "length")]
    #[serde(rename = "length")]
    ByLength,
    /// Each length gets one shared index; work units are reference offset ranges
    #[value(name = "offset")]
    #[serde(rename = "offset")]
    ByOffset,
}

/// Parses a focus override, ignoring anything that is not an unsigned integer
#[must_use]
pub fn parse_focus(value: Option<&str>) -> Option<usize> {
    let value = value?;
    match value.trim().parse::<usize>() {
        Ok(focus) => Some(focus),
        Err(_) => {
            log::warn!("Ignoring invalid {FOCUS_ENV_VAR} value: {value:?}");
            None
        }
    }
}

/// Options controlling a repeat search
#[derive(Debug, Clone, PartialEq)]
pub struct FinderOptions {
    min_length: usize,
    max_length: usize,
    max_repeats: usize,
    similarity_threshold: f64,
    focus_offset: Option<usize>,
    worker_count: usize,
    strategy: Strategy,
    index_side: IndexSide,
    reverse_rule: ReverseRule,
    kmer_size: usize,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
            max_repeats: DEFAULT_MAX_REPEATS,
            similarity_threshold: DEFAULT_SIMILARITY,
            focus_offset: None,
            worker_count: 0,
            strategy: Strategy::default(),
            index_side: IndexSide::default(),
            reverse_rule: ReverseRule::default(),
            kmer_size: DEFAULT_KMER_SIZE,
        }
    }
}

impl FinderOptions {
    /// Preset for similarity matching: lengths 50-101 at 99% identity
    #[must_use]
    pub fn fuzzy() -> Self {
        Self {
            min_length: FUZZY_MIN_LENGTH,
            max_length: FUZZY_MAX_LENGTH,
            similarity_threshold: FUZZY_SIMILARITY,
            ..Self::default()
        }
    }

    /// Starts a builder from the default (exact) preset
    #[must_use]
    pub fn builder() -> FinderOptionsBuilder {
        FinderOptionsBuilder::from(Self::default())
    }

    /// Turns these options back into a builder
    #[must_use]
    pub fn into_builder(self) -> FinderOptionsBuilder {
        FinderOptionsBuilder::from(self)
    }

    /// Checks every invariant the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(ConfigError::InvalidLengthRange {
                min: self.min_length,
                max: self.max_length,
            }
            .into());
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.similarity_threshold).into());
        }
        if self.max_repeats == 0 {
            return Err(ConfigError::ZeroMaxRepeats.into());
        }
        if self.kmer_size == 0 {
            return Err(ConfigError::ZeroKmerSize.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    #[must_use]
    pub fn max_repeats(&self) -> usize {
        self.max_repeats
    }

    #[must_use]
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// The explicitly configured focus offset, if any
    #[must_use]
    pub fn focus_offset(&self) -> Option<usize> {
        self.focus_offset
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[must_use]
    pub fn index_side(&self) -> IndexSide {
        self.index_side
    }

    #[must_use]
    pub fn reverse_rule(&self) -> ReverseRule {
        self.reverse_rule
    }

    #[must_use]
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Requested worker count (0 means one per logical core)
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of worker threads that will actually run
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        resolve_threads(self.worker_count)
    }

    /// Inclusive window-length range for a query/reference pair
    ///
    /// The upper bound is clipped to both sequence lengths; `None` when nothing
    /// in the range fits.
    #[must_use]
    pub fn length_range(&self, query: &Sequence, reference: &Sequence) -> Option<(usize, usize)> {
        let upper = self.max_length.min(query.len()).min(reference.len());
        (self.min_length <= upper).then_some((self.min_length, upper))
    }

    /// Focus offset used by the region-limiting heuristic
    ///
    /// Explicit option first, then the `SPECIAL_CHECK_AREA` environment variable,
    /// then the midpoint of the query.
    #[must_use]
    pub fn resolve_focus(&self, query: &Sequence) -> usize {
        let env_value = std::env::var(FOCUS_ENV_VAR).ok();
        self.resolve_focus_with(query, env_value.as_deref())
    }

    /// [`resolve_focus`](Self::resolve_focus) with the environment value supplied by the caller
    #[must_use]
    pub fn resolve_focus_with(&self, query: &Sequence, env_value: Option<&str>) -> usize {
        self.focus_offset
            .or_else(|| parse_focus(env_value))
            .unwrap_or_else(|| query.midpoint())
    }
}

/// Builder for [`FinderOptions`]
///
/// Every setter consumes and returns the builder; [`build`](Self::build) validates.
///
/// ```rust
/// use repseek::{FinderOptions, Strategy};
///
/// let options = FinderOptions::builder()
///     .min_length(12)
///     .max_length(40)
///     .worker_count(2)
///     .strategy(Strategy::ByOffset)
///     .build()
///     .unwrap();
/// assert_eq!(options.min_length(), 12);
/// ```
#[derive(Debug, Clone)]
pub struct FinderOptionsBuilder {
    options: FinderOptions,
}

impl From<FinderOptions> for FinderOptionsBuilder {
    fn from(options: FinderOptions) -> Self {
        Self { options }
    }
}

impl FinderOptionsBuilder {
    #[must_use]
    pub fn min_length(mut self, min_length: usize) -> Self {
        self.options.min_length = min_length;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.options.max_length = max_length;
        self
    }

    /// Sets both ends of the length range at once
    #[must_use]
    pub fn lengths(self, min_length: usize, max_length: usize) -> Self {
        self.min_length(min_length).max_length(max_length)
    }

    #[must_use]
    pub fn max_repeats(mut self, max_repeats: usize) -> Self {
        self.options.max_repeats = max_repeats;
        self
    }

    /// Sets the similarity threshold; 1.0 selects exact matching
    #[must_use]
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.options.similarity_threshold = threshold;
        self
    }

    /// Pins the focus offset, taking precedence over `SPECIAL_CHECK_AREA`
    #[must_use]
    pub fn focus_offset(mut self, focus: usize) -> Self {
        self.options.focus_offset = Some(focus);
        self
    }

    /// Sets the worker count (0 means one per logical core)
    #[must_use]
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.options.worker_count = workers;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.options.strategy = strategy;
        self
    }

    #[must_use]
    pub fn index_side(mut self, side: IndexSide) -> Self {
        self.options.index_side = side;
        self
    }

    #[must_use]
    pub fn reverse_rule(mut self, rule: ReverseRule) -> Self {
        self.options.reverse_rule = rule;
        self
    }

    /// k-mer size of the fuzzy hash
    #[must_use]
    pub fn kmer_size(mut self, k: usize) -> Self {
        self.options.kmer_size = k;
        self
    }

    pub fn build(self) -> Result<FinderOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
