//! Request gate: a concurrency cap plus minimum spacing between call starts.
//!
//! One gate is shared by every caller of a [`super::CompletionClient`]. A call
//! first takes a permit, then waits until `delay` has passed since the previous
//! call *started*. The permit is held until the call finishes.
//!
//! Time is `tokio::time::Instant`, so tests with a paused runtime see a
//! deterministic clock.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Debug)]
pub struct RequestGate {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    delay: Duration,
    last_start: Mutex<Option<Instant>>,
}

/// Held for the duration of one outbound call.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestGate {
    pub fn new(max_concurrent: usize, delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            delay,
            last_start: Mutex::new(None),
        }
    }

    /// A gate with no pacing, only the concurrency cap.
    pub fn unpaced(max_concurrent: usize) -> Self {
        Self::new(max_concurrent, Duration::ZERO)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn acquire(&self) -> Result<GatePermit, AcquireError> {
        let permit = self.permits.clone().acquire_owned().await?;

        // Holding the lock across the sleep keeps starts strictly ordered.
        let mut last = self.last_start.lock().await;
        if let Some(ready_at) = (*last).and_then(|prev| prev.checked_add(self.delay)) {
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "rate limiting: waiting before next request"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);

        Ok(GatePermit { _permit: permit })
    }
}
