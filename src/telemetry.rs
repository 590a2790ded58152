//! Telemetry logic.
//! Logging goes through `tracing`; counters through `metrics`, recorded only
//! when the embedding process installs a recorder.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const DEFAULT_FILTER: &str = "info";

/// Install a formatting subscriber filtered by `RUST_LOG`.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .try_init();
}

/// Describe counters so recorders can expose help text.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "rollback_attempts_total",
        "Root password writes issued while rolling back."
    );
    metrics::describe_counter!(
        "rollback_total",
        "Finished rollbacks, labelled by outcome."
    );
    metrics::describe_counter!(
        "rotations_total",
        "Forward rotations, labelled by kind and status."
    );
}
