//! One-shot completion signals shared between the reader task and the driver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;

/// An edge-triggered flag: the reader sets it, the driver clears it before
/// issuing a command and waits on it with a timeout. Safe for concurrent
/// set/clear/wait.
#[derive(Debug, Default)]
pub struct Event {
    flag: AtomicBool,
    notify: Notify,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Waits until the flag is set or `timeout` elapses; returns whether the
    /// flag was observed set.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        time::timeout(timeout, self.wait()).await.is_ok()
    }

    async fn wait(&self) {
        loop {
            // Register for the wakeup before checking, so a set() between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::Event;

    #[tokio::test]
    async fn already_set_returns_immediately() {
        let event = Event::new();
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn times_out_when_never_set() {
        let event = Event::new();
        assert!(!event.wait_timeout(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn wakes_a_waiting_task() {
        let event = Arc::new(Event::new());

        let waiter = tokio::spawn({
            let event = Arc::clone(&event);
            async move { event.wait_timeout(Duration::from_secs(1)).await }
        });
        tokio::task::yield_now().await;
        event.set();

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn clear_resets_the_edge() {
        let event = Event::new();
        event.set();
        event.clear();
        assert!(!event.wait_timeout(Duration::from_millis(10)).await);
    }
}
