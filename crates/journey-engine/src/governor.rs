//! Bounded-concurrency governor for browsing sessions.
//!
//! A plain FIFO semaphore: `acquire` suspends until fewer than `max` sessions
//! are active, waiters wake strictly in arrival order, and the counter and
//! queue live behind a single mutex so there is exactly one mutation point.

use std::collections::VecDeque;
use std::sync::Arc;

use funnelprobe_core_types::ConcurrencyStatus;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

struct GovernorState {
    active: usize,
    queue: VecDeque<oneshot::Sender<()>>,
}

/// Process-wide session ceiling. Never fails at runtime; a zero ceiling is a
/// startup configuration error.
pub struct SessionGovernor {
    max: usize,
    state: Mutex<GovernorState>,
}

impl SessionGovernor {
    /// Panics when `max == 0`: that is a misconfiguration caught at startup,
    /// not a runtime condition.
    pub fn new(max: usize) -> Arc<Self> {
        assert!(max > 0, "session governor requires a ceiling of at least 1");
        Arc::new(Self {
            max,
            state: Mutex::new(GovernorState {
                active: 0,
                queue: VecDeque::new(),
            }),
        })
    }

    /// Wait for a slot. Returns a permit that releases on drop, waking the
    /// oldest queued waiter.
    pub async fn acquire(self: &Arc<Self>) -> GovernorPermit {
        let waiter = {
            let mut state = self.state.lock();
            if state.active < self.max {
                state.active += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = waiter {
            debug!(target: "journey-engine", "governor queue entered");
            // The slot is handed over by the releasing side; the active count
            // does not move on hand-off.
            let _ = rx.await;
        }

        GovernorPermit {
            governor: Arc::clone(self),
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        loop {
            match state.queue.pop_front() {
                Some(waiter) => {
                    if waiter.send(()).is_ok() {
                        return;
                    }
                    // Waiter gave up (future dropped); try the next one.
                }
                None => {
                    state.active = state.active.saturating_sub(1);
                    return;
                }
            }
        }
    }

    pub fn status(&self) -> ConcurrencyStatus {
        let state = self.state.lock();
        ConcurrencyStatus {
            active: state.active,
            max: self.max,
            queued: state.queue.len(),
        }
    }
}

/// One held session slot.
pub struct GovernorPermit {
    governor: Arc<SessionGovernor>,
}

impl Drop for GovernorPermit {
    fn drop(&mut self) {
        self.governor.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn capacity_is_never_exceeded() {
        let governor = SessionGovernor::new(2);
        let a = governor.acquire().await;
        let _b = governor.acquire().await;

        let status = governor.status();
        assert_eq!(status.active, 2);
        assert_eq!(status.max, 2);

        let third = {
            let governor = governor.clone();
            tokio::spawn(async move {
                let _permit = governor.acquire().await;
            })
        };
        sleep(Duration::from_millis(50)).await;
        assert_eq!(governor.status().queued, 1);
        assert_eq!(governor.status().active, 2);

        drop(a);
        timeout(Duration::from_secs(1), third)
            .await
            .expect("queued waiter must resolve after a release")
            .unwrap();
        assert_eq!(governor.status().queued, 0);
    }

    #[tokio::test]
    async fn waiters_wake_in_fifo_order() {
        let governor = SessionGovernor::new(1);
        let first = governor.acquire().await;

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for index in 0..3 {
            let governor = governor.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let permit = governor.acquire().await;
                order.lock().push(index);
                drop(permit);
            }));
            // Serialize arrival so queue order is deterministic.
            sleep(Duration::from_millis(30)).await;
        }

        drop(first);
        for handle in handles {
            timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn immediate_capacity_returns_without_queueing() {
        let governor = SessionGovernor::new(3);
        let _permit = governor.acquire().await;
        let status = governor.status();
        assert_eq!(status.active, 1);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test]
    async fn abandoned_waiters_do_not_strand_the_slot() {
        let governor = SessionGovernor::new(1);
        let first = governor.acquire().await;

        let abandoned = {
            let governor = governor.clone();
            tokio::spawn(async move {
                let _ = governor.acquire().await;
            })
        };
        sleep(Duration::from_millis(30)).await;
        abandoned.abort();
        let _ = abandoned.await;

        drop(first);
        // The slot must be reusable immediately.
        let _second = timeout(Duration::from_secs(1), governor.acquire())
            .await
            .expect("slot freed after abandoned waiter");
        assert_eq!(governor.status().active, 1);
    }

    #[test]
    #[should_panic]
    fn zero_ceiling_is_a_startup_error() {
        let _ = SessionGovernor::new(0);
    }
}
