//! Tracing subscriber setup for the binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Filter directives come from `TSFIT_LOG` (default `info`) and
//! events go to stderr so stdout stays reserved for reports.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::AppError;

pub const LOG_ENV: &str = "TSFIT_LOG";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber; repeated calls are no-ops.
pub fn init_tracing() -> Result<(), AppError> {
    if INITIALISED.set(()).is_err() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::new(1, format!("Failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        init_tracing().unwrap();
        init_tracing().unwrap();
    }
}
