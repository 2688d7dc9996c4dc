//! Structured JSON logging (A3, spec §4.12).
//!
//! Grounded on the teacher crate's `logging.rs`. Defaults to `info` level
//! unless overridden by `CALLSCRIBE_LOG`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Idempotent: safe to call more than once (e.g. from multiple test setups).
pub fn init() {
    let filter = EnvFilter::builder()
        .with_env_var("CALLSCRIBE_LOG")
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_span_list(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
