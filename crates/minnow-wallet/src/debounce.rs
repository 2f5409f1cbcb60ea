//! Cancel-and-reschedule primitive for deferred work.
//!
//! A [`Debouncer`] owns at most one pending task. Scheduling new work
//! cancels whatever was pending, so a burst of mutations collapses into a
//! single deferred run after the idle delay. Cancellation is first-class:
//! callers that want to run the work immediately cancel the timer and do it
//! themselves.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Schedules a single deferred task, replacing any pending one.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// A debouncer with the given idle delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// The configured idle delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `work` to run after the idle delay, cancelling any
    /// previously scheduled run. Must be called from within a tokio
    /// runtime.
    pub fn schedule<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending run, if any. Returns whether one was cancelled.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }

    /// Whether a scheduled run is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter_task(counter: &Arc<AtomicU32>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_after_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicU32::new(0));

        debouncer.schedule(counter_task(&counter));
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_collapses_to_one_run() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicU32::new(0));

        debouncer.schedule(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.schedule(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.schedule(counter_task(&counter));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_run() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = Arc::new(AtomicU32::new(0));

        debouncer.schedule(counter_task(&counter));
        assert!(debouncer.cancel());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_without_pending_is_false() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        assert!(!debouncer.cancel());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn new_schedule_after_fire_runs_again() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));

        debouncer.schedule(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.schedule(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
