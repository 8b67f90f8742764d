//! Diagnostics on stderr.
//!
//! Command output (activities, countdown ticks) goes to stdout. Everything
//! here goes to stderr, so piping `tracker recent` into `jq` stays clean.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise each `-v` raises this crate's level:
/// none is `warn`, one is `info`, two or more is `debug`.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity > 1)
                .compact(),
        )
        .init();
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,tracker=info",
        _ => "warn,tracker=debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_only_tracker_level() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "warn,tracker=info");
        assert_eq!(default_directive(5), "warn,tracker=debug");
        for verbosity in 0..3 {
            assert!(EnvFilter::try_new(default_directive(verbosity)).is_ok());
        }
    }
}
