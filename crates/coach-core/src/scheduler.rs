use std::future::Future;

use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

struct PendingExpiry {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Owns the single timer that fires when the active intervals run out.
///
/// Every armed timer gets a fresh generation. The fire path has to call
/// [`ExpiryScheduler::complete`] with its generation before acting, which
/// filters out a timer that woke up just before being cancelled.
#[derive(Default)]
pub struct ExpiryScheduler {
    pending: Option<PendingExpiry>,
    generation: u64,
}

impl ExpiryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the pending timer and, when a deadline is given, arms a new one
    /// that runs the future built by `on_fire` once the deadline passes.
    /// Returns the generation of the armed timer.
    pub fn reschedule<F, Fut>(&mut self, deadline: Option<Instant>, on_fire: F) -> Option<u64>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let deadline = deadline?;

        self.generation += 1;
        let generation = self.generation;
        let fire = on_fire(generation);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire.await;
        });
        debug!(event = "expiry_armed", generation);
        self.pending = Some(PendingExpiry {
            generation,
            deadline,
            handle,
        });
        Some(generation)
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            let remaining = pending.deadline.saturating_duration_since(Instant::now());
            debug!(
                event = "expiry_cancelled",
                generation = pending.generation,
                remaining_ms = remaining.as_millis() as u64
            );
        }
    }

    /// Disarms the timer if `generation` is the one currently armed. The
    /// handle is dropped, not aborted, since the caller is that timer's task.
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.generation() != Some(generation) {
            return false;
        }
        self.pending = None;
        true
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    pub fn generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.generation)
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
