//! The call-start epoch (A7, spec §4.16, §5, §9 Design Note 2).
//!
//! Process-wide state initialized once via compare-and-set on the first
//! `JobState` event and read concurrently by every track-ingest task. A
//! one-shot broadcast would be equivalent; a `OnceLock` is simpler and needs
//! no task to stay alive to serve late subscribers.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct CallStartEpoch {
    inner: Arc<OnceLock<Instant>>,
}

impl CallStartEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the epoch from a call-start unix-ms timestamp, if not already
    /// set. A failed `set` means another caller already won the race; this
    /// is not an error (§4.16).
    pub fn set_from_unix_ms(&self, start_at_unix_ms: i64) {
        let now_unix_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(start_at_unix_ms);
        let delta_ms = now_unix_ms - start_at_unix_ms;
        let epoch = if delta_ms >= 0 {
            Instant::now() - Duration::from_millis(delta_ms as u64)
        } else {
            Instant::now() + Duration::from_millis((-delta_ms) as u64)
        };
        let _ = self.inner.set(epoch);
    }

    pub fn get(&self) -> Option<Instant> {
        self.inner.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_idempotent_first_writer_wins() {
        let epoch = CallStartEpoch::new();
        assert!(epoch.get().is_none());
        epoch.set_from_unix_ms(0);
        let first = epoch.get().unwrap();
        epoch.set_from_unix_ms(1_000_000_000);
        assert_eq!(epoch.get().unwrap(), first);
    }
}
