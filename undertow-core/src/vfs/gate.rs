//! One-shot readiness latch over swarm metadata availability
//!
//! The gate starts `Pending` and settles exactly once: `Ready` when the swarm
//! reports metadata, `Failed(TimedOut)` when the timeout elapses first, or
//! `Failed(TornDown)` when the adapter shuts down. Every waiter observes the
//! same terminal state.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::swarm::{InfoHash, Swarm};

/// Why the gate settled without becoming ready.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("swarm metadata not ready after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },

    #[error("readiness gate torn down")]
    TornDown,
}

/// Current state of the readiness gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Ready,
    Failed(GateError),
}

impl GateState {
    /// Whether the gate has settled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GateState::Pending)
    }

    fn outcome(&self) -> Result<(), GateError> {
        match self {
            GateState::Ready => Ok(()),
            GateState::Failed(error) => Err(error.clone()),
            GateState::Pending => Err(GateError::TornDown),
        }
    }
}

/// Latch that every swarm-touching operation awaits first.
pub struct ReadinessGate {
    latch: Arc<Latch>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the gate and its watcher task.
///
/// The deadline is fixed at engage time. Synchronous state checks settle an
/// expired gate themselves, so a runtime that sat idle past the deadline still
/// reports the timeout before its watcher task is polled again.
struct Latch {
    state: watch::Sender<GateState>,
    signal: Mutex<Option<oneshot::Receiver<()>>>,
    deadline: Instant,
    timeout: Duration,
    info_hash: InfoHash,
}

impl ReadinessGate {
    /// Engages the swarm and starts the timeout.
    ///
    /// An already-ready swarm settles the gate immediately without registering
    /// a notification or starting a timer. Otherwise exactly one notification
    /// is registered, then the timer starts; the deadline counts from this
    /// call, not from the first time the runtime polls the watcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn engage(swarm: &dyn Swarm, timeout: Duration) -> Self {
        let (state, _) = watch::channel(GateState::Pending);
        let info_hash = swarm.info_hash();

        if swarm.is_ready() {
            debug!(%info_hash, "Swarm metadata already available");
            state.send_replace(GateState::Ready);
            let latch = Latch {
                state,
                signal: Mutex::new(None),
                deadline: Instant::now(),
                timeout,
                info_hash,
            };
            return Self {
                latch: Arc::new(latch),
                watcher: Mutex::new(None),
            };
        }

        let (notifier, signal) = oneshot::channel();
        swarm.notify_ready(notifier);

        let deadline = Instant::now() + timeout;
        let timer = tokio::time::sleep_until(deadline);
        let latch = Arc::new(Latch {
            state,
            signal: Mutex::new(Some(signal)),
            deadline,
            timeout,
            info_hash,
        });

        let task_latch = Arc::clone(&latch);
        let watcher = tokio::spawn(async move {
            let notified = std::future::poll_fn(|cx| task_latch.poll_signal(cx));
            tokio::select! {
                () = notified => {}
                () = timer => task_latch.expire(),
            }
        });

        Self {
            latch,
            watcher: Mutex::new(Some(watcher)),
        }
    }

    /// Waits until the gate settles and returns its outcome.
    ///
    /// Returns instantly once the gate is terminal or its deadline has passed.
    ///
    /// # Errors
    /// - `GateError::TimedOut` - Metadata did not arrive in time
    /// - `GateError::TornDown` - The gate was closed before settling
    pub async fn await_ready(&self) -> Result<(), GateError> {
        let current = self.state();
        if current.is_terminal() {
            return current.outcome();
        }

        let mut receiver = self.latch.state.subscribe();
        let settled = receiver
            .wait_for(GateState::is_terminal)
            .await
            .map_err(|_| GateError::TornDown)?;
        settled.outcome()
    }

    /// Current state without waiting.
    ///
    /// A pending gate past its deadline settles here rather than waiting for
    /// the watcher task to run.
    pub fn state(&self) -> GateState {
        self.latch.check_deadline();
        self.latch.state.borrow().clone()
    }

    /// Tears the gate down. A pending gate fails with `TornDown`; a settled
    /// gate keeps its outcome.
    pub fn close(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
        }
        settle(&self.latch.state, GateState::Failed(GateError::TornDown));
    }
}

impl Drop for ReadinessGate {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get_mut().take() {
            watcher.abort();
        }
    }
}

impl Latch {
    /// Polls the ready notification, settling `Ready` when it fires.
    ///
    /// Stays pending forever once the notification is gone; the timer settles
    /// the gate in that case.
    fn poll_signal(&self, cx: &mut Context<'_>) -> Poll<()> {
        let mut signal = self.signal.lock();
        let Some(receiver) = signal.as_mut() else {
            return Poll::Pending;
        };

        match Pin::new(receiver).poll(cx) {
            Poll::Ready(Ok(())) => {
                *signal = None;
                if settle(&self.state, GateState::Ready) {
                    debug!(info_hash = %self.info_hash, "Swarm metadata ready");
                }
                Poll::Ready(())
            }
            // Notification dropped unfired
            Poll::Ready(Err(_)) => {
                *signal = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Settles the gate once the deadline has passed.
    ///
    /// A notification that was already delivered still wins.
    fn expire(&self) {
        let mut signal = self.signal.lock();
        if let Some(mut receiver) = signal.take()
            && receiver.try_recv().is_ok()
        {
            if settle(&self.state, GateState::Ready) {
                debug!(info_hash = %self.info_hash, "Swarm metadata ready");
            }
            return;
        }

        let timed_out = GateState::Failed(GateError::TimedOut {
            timeout_ms: self.timeout.as_millis() as u64,
        });
        if settle(&self.state, timed_out) {
            warn!(
                info_hash = %self.info_hash,
                timeout_ms = self.timeout.as_millis() as u64,
                "Swarm metadata never arrived"
            );
        }
    }

    fn check_deadline(&self) {
        let pending = !self.state.borrow().is_terminal();
        if pending && Instant::now() >= self.deadline {
            self.expire();
        }
    }
}

/// Moves a pending gate to `outcome`; terminal states never change.
fn settle(state: &watch::Sender<GateState>, outcome: GateState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = outcome;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mocks::MockSwarm;

    #[tokio::test]
    async fn test_ready_swarm_settles_immediately() {
        let swarm = MockSwarm::builder().ready().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_millis(50));

        assert_eq!(gate.state(), GateState::Ready);
        assert_eq!(swarm.ready_registrations(), 0);
        assert!(gate.await_ready().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_signal_settles_gate() {
        let swarm = MockSwarm::builder().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_secs(5));
        assert_eq!(gate.state(), GateState::Pending);

        swarm.mark_ready();
        assert!(gate.await_ready().await.is_ok());
        assert_eq!(gate.state(), GateState::Ready);

        // Timer was cancelled; advancing past it leaves the gate ready
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(gate.state(), GateState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_gate() {
        let swarm = MockSwarm::builder().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_millis(50));

        let result = gate.await_ready().await;
        assert_eq!(result, Err(GateError::TimedOut { timeout_ms: 50 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_ready_signal_ignored() {
        let swarm = MockSwarm::builder().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_millis(50));

        assert!(gate.await_ready().await.is_err());
        swarm.mark_ready();
        tokio::task::yield_now().await;

        assert_eq!(
            gate.state(),
            GateState::Failed(GateError::TimedOut { timeout_ms: 50 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_observe_same_outcome() {
        let swarm = MockSwarm::builder().build();
        let gate = Arc::new(ReadinessGate::engage(&*swarm, Duration::from_secs(1)));

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.await_ready().await })
            })
            .collect();

        swarm.mark_ready();
        for waiter in waiters {
            assert!(waiter.await.unwrap().is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_waits_do_not_reregister() {
        let swarm = MockSwarm::builder().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_millis(50));

        for _ in 0..3 {
            assert!(gate.await_ready().await.is_err());
        }
        assert_eq!(swarm.ready_registrations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_tears_down_pending_gate() {
        let swarm = MockSwarm::builder().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_secs(5));

        gate.close();
        assert_eq!(gate.await_ready().await, Err(GateError::TornDown));

        // Ready arriving after teardown changes nothing
        swarm.mark_ready();
        tokio::task::yield_now().await;
        assert_eq!(gate.state(), GateState::Failed(GateError::TornDown));
    }

    #[tokio::test]
    async fn test_close_keeps_ready_outcome() {
        let swarm = MockSwarm::builder().ready().build();
        let gate = ReadinessGate::engage(&*swarm, Duration::from_secs(5));

        gate.close();
        assert!(gate.await_ready().await.is_ok());
    }
}
