//! Logging setup for the binaries
//!
//! The library logs through the `log` facade only. Binaries install `env_logger`, which writes to
//! stderr so that results on stdout stay machine readable.
use log::LevelFilter;
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<()> = OnceCell::new();

/// Map a `-v` count to a level filter
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize logging with a level derived from `verbosity`.
///
/// `RUST_LOG` overrides the level when set. Calling this more than once has no further effect.
pub fn init(verbosity: u8) {
    LOGGER.get_or_init(|| {
        let _ = env_logger::Builder::new()
            .filter_level(level_for(verbosity))
            .parse_default_env()
            .format_timestamp(None)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    #[test]
    fn init_is_idempotent() {
        init(1);
        init(3);
    }
}
