//! Tracing setup for MindVision.
//!
//! Everything is written to stderr. Stdout carries the playback display and
//! command output, and scripts read it.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter for a `-v` count: warnings, then info, then debug
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives override `default_level`. Calling this again after
/// a subscriber is installed has no effect.
pub fn init(default_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized at {}", default_level);
    }
}
