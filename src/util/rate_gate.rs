//! Process-wide artist-top-tracks rate gate (spec §5): "at most one request
//! per 1.5 seconds across all workflows. Implementation: a mutex + last-
//! request timestamp." Grounded in the teacher's heartbeat/timeout pattern
//! in `services/station_manager.rs`, adapted from a per-session map to a
//! single shared gate since this resource is process-wide, not per-session.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        RateGate {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Block until it is this caller's turn, then record the send time.
    /// Holding the mutex across the sleep keeps other waiters strictly
    /// serialized, which is what guarantees the 1.5s spacing under
    /// concurrent workflows (spec P9).
    pub async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn serializes_and_spaces_requests() {
        let gate = std::sync::Arc::new(RateGate::new(Duration::from_millis(1500)));

        let start = Instant::now();
        gate.wait_turn().await;
        gate.wait_turn().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
    }
}
