use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Maps the number of `-v` flags to a level filter
///
/// No flag shows warnings, one flag adds progress messages and two or more add
/// per-length debugging output.
#[must_use]
pub fn level_for(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

/// Initialize the logger with custom formatting showing elapsed time.
///
/// Output format: [HH:MM:SS] LEVEL: message
/// All output goes to stderr. `RUST_LOG` is still honoured.
pub fn init_logger(verbosity: u8) {
    START_TIME.set(Instant::now()).ok();

    env_logger::Builder::new()
        .filter_level(level_for(verbosity))
        .parse_default_env()
        .format(|buf, record| {
            let elapsed = START_TIME
                .get()
                .map(Instant::elapsed)
                .unwrap_or_default();
            let hours = elapsed.as_secs() / 3600;
            let minutes = (elapsed.as_secs() % 3600) / 60;
            let seconds = elapsed.as_secs() % 60;

            writeln!(
                buf,
                "[{:02}:{:02}:{:02}] {}: {}",
                hours,
                minutes,
                seconds,
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
