use jiff::Timestamp;
use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

/// Structured events for one credential renewal attempt.
///
/// `context` names the request whose 401 started the renewal (`manual` for
/// [`refresh_credential`](crate::TransportClient::refresh_credential)). Callers
/// that join later share the attempt and only show up in the `waiters` count
/// reported when it settles. Token values are never recorded.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    context: String,
}

impl RefreshTelemetry {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            context: context.into(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// What triggered the renewal, e.g. `GET /listings`.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The renewal call is about to go out.
    pub fn emit_start(&self, at: Timestamp) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %at,
            "refresh.start"
        );
    }

    /// `waiters` is how many queued callers were still listening for the new credential.
    pub fn emit_success(&self, at: Timestamp, waiters: usize) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %at,
            waiters,
            "refresh.success"
        );
    }

    /// Logged at ERROR: every waiter is about to get its original 401 back.
    pub fn emit_failure(&self, error: &Error, at: Timestamp, waiters: usize) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            context = %self.context,
            timestamp = %at,
            waiters,
            error = %error,
            "refresh.failure"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_renewal_attempt_gets_its_own_id() {
        let telemetry = RefreshTelemetry::new("GET /a");
        assert_eq!(telemetry.context(), "GET /a");
        let first = telemetry.attempt_id();
        assert_eq!(first, telemetry.attempt_id());
        assert_ne!(first, RefreshTelemetry::new("GET /a").attempt_id());
    }
}
