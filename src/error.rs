use std::path::PathBuf;

/// Custom Result type for repeat search operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the repseek library, encompassing all possible error cases
/// that can occur while loading sequences, configuring a search, or running it.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to loading input sequences
    InputError(#[from] InputError),
    /// Errors related to invalid search options or configuration files
    ConfigError(#[from] ConfigError),
    /// Errors that abort a running search
    SearchError(#[from] SearchError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
}

/// Errors that occur before the engine runs because an input is unusable
#[derive(thiserror::Error, Debug)]
pub enum InputError {
    /// The file could not be opened or read
    #[error("File unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path exists but is not a regular file (e.g. a directory)
    #[error("File is not regular: {0}")]
    IncompatibleFile(PathBuf),

    /// No nucleotides were left after normalisation
    ///
    /// # Arguments
    /// * `String` - A label for the sequence (usually its path)
    #[error("Sequence is empty after filtering to ACGT: {0}")]
    EmptySequence(String),

    /// A row of a planted-repeat answer key could not be parsed
    #[error("Malformed answer key row {line}: {detail}")]
    InvalidAnswerKey { line: usize, detail: String },
}

/// Errors raised while validating [`FinderOptions`](crate::FinderOptions) or reading a config file
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The window length range is empty or starts at zero
    #[error("Invalid length range: min_length ({min}) must be >= 1 and <= max_length ({max})")]
    InvalidLengthRange { min: usize, max: usize },

    /// The similarity threshold is outside of (0, 1]
    #[error("Similarity threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    /// `max_repeats` was zero
    #[error("max_repeats must be at least 1")]
    ZeroMaxRepeats,

    /// The fuzzy k-mer size was zero
    #[error("k-mer size must be at least 1")]
    ZeroKmerSize,

    /// The configuration file could not be parsed
    #[error("Invalid configuration file {path}: {detail}")]
    InvalidFile { path: PathBuf, detail: String },
}

/// Errors that abort a search that was already running
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// A buffer for an index or for results could not be reserved
    ///
    /// # Fields
    /// * `what` - The buffer being grown
    /// * `requested` - The number of additional elements requested
    #[error("Failed to reserve {requested} elements for {what}")]
    Allocation {
        what: &'static str,
        requested: usize,
    },

    /// A worker thread panicked before completing its work units
    ///
    /// # Arguments
    /// * `usize` - The thread ID of the worker
    #[error("Worker thread {0} panicked")]
    WorkerPanicked(usize),
}

impl SearchError {
    pub(crate) fn allocation(what: &'static str, requested: usize) -> Self {
        Self::Allocation { what, requested }
    }
}
