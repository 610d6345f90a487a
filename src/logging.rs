use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Normalize a configured level name. Unknown names fall back to `info`.
pub fn parse_level(level: &str) -> (LevelFilter, bool) {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => (LevelFilter::TRACE, true),
        "debug" => (LevelFilter::DEBUG, true),
        "info" => (LevelFilter::INFO, true),
        "warn" => (LevelFilter::WARN, true),
        "error" => (LevelFilter::ERROR, true),
        "off" => (LevelFilter::OFF, true),
        _ => (LevelFilter::INFO, false),
    }
}

/// Install a stderr subscriber. `RUST_LOG` wins over `level` when set.
/// Calling this twice keeps the first subscriber.
pub fn init_logging(level: &str) {
    let (default_level, recognized) = parse_level(level);

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy(std::env::var("RUST_LOG").unwrap_or_default());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed && !recognized {
        tracing::warn!("Invalid log level '{}', defaulting to 'info'", level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_parse() {
        assert_eq!(parse_level("debug"), (LevelFilter::DEBUG, true));
        assert_eq!(parse_level(" WARN "), (LevelFilter::WARN, true));
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(parse_level("chatty"), (LevelFilter::INFO, false));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging("debug");
        init_logging("nonsense");
    }
}
