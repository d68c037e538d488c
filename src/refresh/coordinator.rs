use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use tokio::sync::oneshot;
use tracing::debug;

use crate::credential::AccessCredential;
use crate::errors::Error;
use crate::telemetry::refresh::RefreshTelemetry;

use super::{RenewalOutcome, RenewalTicket};

#[derive(Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RenewalOutcome>>,
    },
}

/// Single-flight guard around credential renewal.
///
/// At most one renewal runs at a time. Callers that join while it is in
/// flight are queued and all receive the same [`RenewalOutcome`] once it
/// settles, after which the coordinator is idle again. Clones share state.
#[derive(Clone, Default)]
pub struct RefreshCoordinator {
    state: Arc<Mutex<RefreshState>>,
    renewals: Arc<AtomicU64>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of renewal calls started over the coordinator's lifetime.
    pub fn renewals_started(&self) -> u64 {
        self.renewals.load(Ordering::SeqCst)
    }

    /// Waits on the in-flight renewal, or starts one with `renew` when idle.
    ///
    /// `renew` is only invoked when this call starts a renewal. The renewal
    /// runs on its own task so a caller dropping its ticket never cancels it.
    pub fn join<F, Fut>(&self, context: impl Into<String>, renew: F) -> RenewalTicket
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessCredential, Error>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let started_renewal = {
            let mut state = self.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push(sender);
                    debug!(queued = waiters.len(), "refresh.queued");
                    false
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing {
                        waiters: vec![sender],
                    };
                    true
                }
            }
        };

        if started_renewal {
            self.renewals.fetch_add(1, Ordering::SeqCst);
            let telemetry = RefreshTelemetry::new(context);
            let guard = SettleOnDrop {
                coordinator: Some(self.clone()),
            };
            let renewal = renew();
            tokio::spawn(async move {
                telemetry.emit_start(Timestamp::now());
                match renewal.await {
                    Ok(credential) => {
                        let waiters = guard.settle(RenewalOutcome::Renewed(credential));
                        telemetry.emit_success(Timestamp::now(), waiters);
                    }
                    Err(err) => {
                        let waiters = guard.settle(RenewalOutcome::Failed(failure_reason(&err)));
                        telemetry.emit_failure(&err, Timestamp::now(), waiters);
                    }
                }
            });
        }

        RenewalTicket {
            receiver,
            started_renewal,
        }
    }

    /// Returns to idle and hands `outcome` to every waiter. Returns how many were still listening.
    fn settle(&self, outcome: RenewalOutcome) -> usize {
        let waiters = match std::mem::take(&mut *self.lock()) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };
        debug!(
            waiters = waiters.len(),
            renewed = outcome.is_renewed(),
            "refresh.broadcast"
        );
        waiters
            .into_iter()
            .map(|waiter| waiter.send(outcome.clone()).is_ok())
            .filter(|delivered| *delivered)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn failure_reason(err: &Error) -> String {
    match err {
        Error::Renewal(reason) => reason.clone(),
        other => other.to_string(),
    }
}

/// Keeps waiters from hanging when the renewal task panics or is aborted.
struct SettleOnDrop {
    coordinator: Option<RefreshCoordinator>,
}

impl SettleOnDrop {
    fn settle(mut self, outcome: RenewalOutcome) -> usize {
        self.coordinator
            .take()
            .map_or(0, |coordinator| coordinator.settle(outcome))
    }
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.settle(RenewalOutcome::Failed(
                "renewal task ended before settling".to_string(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn gated_renewal(
        calls: Arc<AtomicUsize>,
        gate: oneshot::Receiver<()>,
        result: Result<&'static str, &'static str>,
    ) -> impl FnOnce() -> std::pin::Pin<
        Box<dyn Future<Output = Result<AccessCredential, Error>> + Send>,
    > {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let _ = gate.await;
                result
                    .map(AccessCredential::new)
                    .map_err(|reason| Error::Renewal(reason.to_string()))
            })
        }
    }

    fn unused_renewal(
        calls: Arc<AtomicUsize>,
    ) -> impl FnOnce() -> std::pin::Pin<
        Box<dyn Future<Output = Result<AccessCredential, Error>> + Send>,
    > {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(Error::Renewal("second renewal started".to_string())) })
        }
    }

    async fn exploding_renewal() -> Result<AccessCredential, Error> {
        panic!("renewal exploded")
    }

    #[tokio::test]
    async fn concurrent_joins_share_one_renewal() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (open, gate) = oneshot::channel();

        let first = coordinator.join("GET /a", gated_renewal(calls.clone(), gate, Ok("T2")));
        let second = coordinator.join("GET /b", unused_renewal(calls.clone()));
        let third = coordinator.join("GET /c", unused_renewal(calls.clone()));

        assert!(first.started_renewal());
        assert!(!second.started_renewal());
        assert!(!third.started_renewal());
        assert!(coordinator.is_refreshing());

        open.send(()).unwrap();
        let (a, b, c) = tokio::join!(first.outcome(), second.outcome(), third.outcome());
        let expected = RenewalOutcome::Renewed(AccessCredential::new("T2"));
        assert_eq!(a, expected);
        assert_eq!(b, expected);
        assert_eq!(c, expected);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.renewals_started(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (open, gate) = oneshot::channel();

        let tickets = vec![
            coordinator.join("GET /a", gated_renewal(calls.clone(), gate, Err("refused"))),
            coordinator.join("GET /b", unused_renewal(calls.clone())),
        ];
        open.send(()).unwrap();
        for ticket in tickets {
            assert_eq!(
                ticket.outcome().await,
                RenewalOutcome::Failed("refused".to_string())
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn settles_back_to_idle_for_the_next_expiry() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (open, gate) = oneshot::channel();
        let ticket = coordinator.join("GET /a", gated_renewal(calls.clone(), gate, Err("down")));
        open.send(()).unwrap();
        assert!(!ticket.outcome().await.is_renewed());

        let (open, gate) = oneshot::channel();
        let ticket = coordinator.join("GET /a", gated_renewal(calls.clone(), gate, Ok("T3")));
        assert!(ticket.started_renewal());
        open.send(()).unwrap();
        assert!(ticket.outcome().await.is_renewed());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.renewals_started(), 2);
    }

    #[tokio::test]
    async fn dropping_the_initiator_does_not_cancel_renewal() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (open, gate) = oneshot::channel();

        let initiator = coordinator.join("GET /a", gated_renewal(calls.clone(), gate, Ok("T2")));
        let waiter = coordinator.join("GET /b", unused_renewal(calls.clone()));
        drop(initiator);

        open.send(()).unwrap();
        assert_eq!(
            waiter.outcome().await,
            RenewalOutcome::Renewed(AccessCredential::new("T2"))
        );
    }

    #[tokio::test]
    async fn panicking_renewal_still_releases_waiters() {
        let coordinator = RefreshCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = coordinator.join("GET /a", exploding_renewal);
        let second = coordinator.join("GET /b", unused_renewal(calls.clone()));

        assert!(!first.outcome().await.is_renewed());
        assert!(!second.outcome().await.is_renewed());
        assert!(!coordinator.is_refreshing());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
