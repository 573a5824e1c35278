//! Detached background work.
//!
//! Cache population must not hold up the response that triggered it. Writes
//! are handed to a scheduler that outlives the request; the server drains it
//! on shutdown.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::task::TaskTracker;

/// Runs fire-and-forget work after the current request has returned.
pub trait BackgroundScheduler: Send + Sync {
    fn schedule(&self, task: BoxFuture<'static, ()>);
}

/// Tokio-backed scheduler that tracks spawned tasks until drained.
#[derive(Debug, Clone, Default)]
pub struct DetachedTasks {
    tracker: TaskTracker,
}

impl DetachedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Stops accepting the notion of "open" work and waits for outstanding
    /// tasks. Returns `false` when the timeout elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();
        drained
    }
}

impl BackgroundScheduler for DetachedTasks {
    fn schedule(&self, task: BoxFuture<'static, ()>) {
        self.tracker.spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn drain_waits_for_scheduled_work() {
        let tasks = DetachedTasks::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = Arc::clone(&done);
            tasks.schedule(
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }

        assert!(tasks.drain(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.pending(), 0);
    }

    #[tokio::test]
    async fn drain_reports_timeout() {
        let tasks = DetachedTasks::new();
        tasks.schedule(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            .boxed(),
        );

        assert!(!tasks.drain(Duration::from_millis(10)).await);
        assert_eq!(tasks.pending(), 1);
    }
}
