use tokio::sync::oneshot;

use crate::credential::AccessCredential;

/// Result of one renewal attempt, broadcast to every waiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenewalOutcome {
    Renewed(AccessCredential),
    Failed(String),
}

impl RenewalOutcome {
    pub fn is_renewed(&self) -> bool {
        matches!(self, RenewalOutcome::Renewed(_))
    }
}

/// A caller's place in the current renewal.
///
/// Dropping a ticket only abandons this caller; the renewal itself and the
/// other waiters are unaffected.
#[derive(Debug)]
pub struct RenewalTicket {
    pub(super) receiver: oneshot::Receiver<RenewalOutcome>,
    pub(super) started_renewal: bool,
}

impl RenewalTicket {
    /// True when joining this ticket moved the coordinator from idle to refreshing.
    pub fn started_renewal(&self) -> bool {
        self.started_renewal
    }

    pub async fn outcome(self) -> RenewalOutcome {
        self.receiver.await.unwrap_or_else(|_| {
            RenewalOutcome::Failed("renewal ended without an outcome".to_string())
        })
    }
}
