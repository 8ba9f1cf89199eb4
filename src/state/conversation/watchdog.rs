use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Time of the last event the reducer processed.
#[derive(Debug)]
pub struct Heartbeat {
    last: Mutex<Instant>,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks the heartbeat every `interval` and cancels `stalled` once nothing
/// has arrived for twice that long. Dropping the watchdog stops the task.
pub struct Watchdog {
    stalled: CancellationToken,
    stop: CancellationToken,
    interval: Duration,
}

impl Watchdog {
    pub fn spawn(heartbeat: Arc<Heartbeat>, interval: Duration) -> Self {
        let stalled = CancellationToken::new();
        let stop = CancellationToken::new();
        let threshold = interval * 2;

        let task_stalled = stalled.clone();
        let task_stop = stop.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_stop.cancelled() => return,
                    _ = ticker.tick() => {
                        let idle = heartbeat.elapsed();
                        if idle > threshold {
                            tracing::warn!(idle_ms = idle.as_millis() as u64, "stream stalled");
                            task_stalled.cancel();
                            return;
                        }
                    }
                }
            }
        });

        Self {
            stalled,
            stop,
            interval,
        }
    }

    pub fn stalled(&self) -> CancellationToken {
        self.stalled.clone()
    }

    pub fn threshold(&self) -> Duration {
        self.interval * 2
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
