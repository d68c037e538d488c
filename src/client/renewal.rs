use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::credential::AccessCredential;
use crate::errors::Error;
use crate::refresh::RenewalOutcome;
use crate::request::{PendingRequest, RequestOptions};

use super::{ClientInner, TransportClient};

#[derive(Deserialize)]
struct RenewalResponse {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

/// Exchanges the refresh cookie for a new access credential and commits the
/// result: stored and announced on success, full session teardown on failure.
///
/// A renewal that outlives a logout is discarded without touching the store.
pub(super) async fn renew(inner: Arc<ClientInner>) -> Result<AccessCredential, Error> {
    let started_in = *inner.session();
    let result = request_renewal(&inner).await;

    let session = inner.session();
    if *session != started_in {
        warn!(renewed = result.is_ok(), "refresh.discarded_after_logout");
        return Err(Error::Renewal("session ended during renewal".to_string()));
    }
    match result {
        Ok(credential) => {
            inner.store.set(credential.clone());
            drop(session);
            inner.sink.on_renewed(&credential);
            Ok(credential)
        }
        Err(err) => {
            error!(error = %err, "session.teardown");
            inner.store.clear();
            drop(session);
            inner.sink.on_session_lost();
            Err(err)
        }
    }
}

// Sent without a bearer header and outside the interceptor, so a 401 here is final.
async fn request_renewal(inner: &ClientInner) -> Result<AccessCredential, Error> {
    let resp = inner
        .http
        .post(inner.refresh_url.clone())
        .timeout(inner.refresh_timeout)
        .send()
        .await
        .map_err(|e| Error::Renewal(format!("no response from renewal endpoint: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Renewal(format!(
            "renewal endpoint returned {status}: {body}"
        )));
    }

    let payload: RenewalResponse = resp
        .json()
        .await
        .map_err(|e| Error::Renewal(format!("malformed renewal response: {e}")))?;
    let token = payload
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| Error::Renewal("renewal response missing accessToken".to_string()))?;
    let credential = AccessCredential::new(token);
    // a token that can't travel as a header would fail every request before a 401 could arrive
    credential
        .header_value()
        .map_err(|_| {
            Error::Renewal(
                "malformed renewal response: accessToken is not a valid header value".to_string(),
            )
        })?;
    info!(len = credential.value().len(), "credential.renewed");
    Ok(credential)
}

impl TransportClient {
    /// Renews the access credential now, sharing any renewal already in flight.
    pub async fn refresh_credential(&self) -> Result<AccessCredential, Error> {
        match self.await_renewal("manual".to_string()).await {
            RenewalOutcome::Renewed(credential) => Ok(credential),
            RenewalOutcome::Failed(reason) => Err(Error::Renewal(reason)),
        }
    }

    /// Best-effort server logout followed by local teardown, which always runs.
    pub async fn logout(&self) {
        let pending = PendingRequest::new(
            reqwest::Method::POST,
            self.inner.logout_url.clone(),
            None,
            RequestOptions::default(),
        );
        if let Err(err) = self.send(&pending).await {
            warn!(error = %err, "logout.request_failed");
        }
        {
            let mut session = self.inner.session();
            *session += 1;
            self.inner.store.clear();
        }
        self.inner.sink.on_logged_out();
        info!("logout.complete");
    }
}
