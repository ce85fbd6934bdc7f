//! Logging and tracing infrastructure for sizediff.
//!
//! The library only emits `tracing` spans and events. Binaries and tests
//! that want to see them call [`init_tracing`] or [`init_tracing_json`].

use std::sync::Once;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

static INIT: Once = Once::new();

/// Environment variable read before `RUST_LOG`.
pub const LOG_ENV_VAR: &str = "SIZEDIFF_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn install<L>(layer: L, mode: &str)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    INIT.call_once(|| {
        if tracing_subscriber::registry()
            .with(env_filter())
            .with(layer)
            .try_init()
            .is_ok()
        {
            info!(mode, "sizediff tracing initialized");
        }
    });
}

/// Initialize the global tracing subscriber.
///
/// Filtering comes from `SIZEDIFF_LOG`, then `RUST_LOG`, then `info`.
/// Only the first call of either init function has any effect, and none
/// if another subscriber was installed first.
pub fn init_tracing() {
    install(
        fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_line_number(true),
        "text",
    );
}

/// Initialize tracing with JSON output for structured logging.
pub fn init_tracing_json() {
    install(
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false),
        "json",
    );
}

/// Macro for creating diff operation spans
#[macro_export]
macro_rules! diff_span {
    ($name:expr) => {
        tracing::info_span!($name)
    };
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

/// Log a failed operation and hand the error back.
///
/// Cancellation is not a failure and only shows up at debug level.
#[macro_export]
macro_rules! log_failure {
    ($err:expr, $operation:expr) => {{
        let e = $err;
        if e.is_cancellation() {
            tracing::debug!(operation = $operation, "Operation cancelled");
        } else {
            tracing::error!(error = %e, operation = $operation, "Operation failed");
        }
        e
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiffError;
    use tracing::debug;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_tracing();
        init_tracing_json();
        init_tracing();
    }

    #[test]
    fn test_span_creation() {
        init_tracing();
        let span = diff_span!("section_diffs", before = "a.dll", after = "b.dll");
        let _guard = span.enter();
        debug!("Inside span");
    }

    #[test]
    fn test_log_failure_returns_error() {
        init_tracing();
        let err = log_failure!(DiffError::Cancelled, "symbol_diffs");
        assert!(err.is_cancellation());

        let err = log_failure!(DiffError::Source("pdb missing".into()), "section_diffs");
        assert!(matches!(err, DiffError::Source(_)));
    }
}
