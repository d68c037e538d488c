use reqwest::Response;
use tracing::{debug, info, warn};

use crate::errors::Error;
use crate::refresh::RenewalOutcome;
use crate::request::PendingRequest;

use super::{TransportClient, renewal};

impl TransportClient {
    /// Sends `pending`, and on a 401 waits for (or starts) a credential renewal
    /// and replays it once with the new credential.
    pub(crate) async fn dispatch(&self, mut pending: PendingRequest) -> Result<Response, Error> {
        loop {
            let err = match self.send(&pending).await {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };
            if !err.is_unauthorized() {
                return Err(err);
            }
            if self.is_renewal_endpoint(&pending) {
                debug!(url = %pending.url, "request.renewal_endpoint_unauthorized");
                return Err(err);
            }
            if pending.retried {
                warn!(request = %pending.describe(), "request.retry_exhausted");
                return Err(match err {
                    Error::Http { status, body } => Error::RetryExhausted { status, body },
                    other => other,
                });
            }
            pending.retried = true;

            match self.await_renewal(pending.describe()).await {
                RenewalOutcome::Renewed(credential) => {
                    info!(request = %pending.describe(), "request.replay");
                    pending.authorize(&credential)?;
                }
                RenewalOutcome::Failed(reason) => {
                    warn!(request = %pending.describe(), reason = %reason, "request.rejected");
                    return Err(err);
                }
            }
        }
    }

    /// Joins the in-flight renewal, starting one if the coordinator is idle.
    pub(crate) async fn await_renewal(&self, context: String) -> RenewalOutcome {
        let inner = self.inner.clone();
        self.inner
            .coordinator
            .join(context, move || renewal::renew(inner))
            .outcome()
            .await
    }

    fn is_renewal_endpoint(&self, pending: &PendingRequest) -> bool {
        pending.url.path().trim_end_matches('/')
            == self.inner.refresh_url.path().trim_end_matches('/')
    }
}
