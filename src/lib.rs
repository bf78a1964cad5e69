pub mod config;
mod error;
mod filter;
mod finder;
pub mod hash;
mod index;
pub mod logging;
pub mod matcher;
mod options;
pub mod parallel;
mod reader;
mod repeat;
mod runs;
mod sequence;
pub mod simulate;
pub mod writer;

pub use error::{ConfigError, Error, InputError, Result, SearchError};
pub use filter::{dedup_repeats, filter_nested, rank};
pub use finder::{find_repeats, RepeatFinder};
pub use index::{similarity, MatchMode, WindowIndex};
pub use options::{
    parse_focus, FinderOptions, FinderOptionsBuilder, Strategy, DEFAULT_MAX_LENGTH,
    DEFAULT_MAX_REPEATS, DEFAULT_MIN_LENGTH, DEFAULT_SIMILARITY, FOCUS_ENV_VAR, FUZZY_MAX_LENGTH,
    FUZZY_MIN_LENGTH, FUZZY_SIMILARITY,
};
pub use reader::{read_pair, read_sequence};
pub use repeat::{IndexSide, RepeatPattern};
pub use runs::{find_runs, find_runs_into, ReverseRule, Run, MIN_TANDEM_RUN};
pub use sequence::{complement, reverse_complement, reverse_complement_into, Sequence, SENTINEL};
pub use writer::{write_reports, PositionStyle, ResultWriter, ResultWriterBuilder};
