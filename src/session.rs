use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

use crate::credential::{AccessCredential, IdentityClaims};

/// Receives session lifecycle changes driven by the transport.
///
/// Implementations decide where a lost session leads (login screen, exit,
/// ...). Callbacks run synchronously on the renewal task.
pub trait SessionSink: Send + Sync {
    /// A renewal succeeded; the credential store already holds `credential`.
    fn on_renewed(&self, credential: &AccessCredential);

    /// Renewal failed; the credential store has already been cleared.
    fn on_session_lost(&self);

    /// The user logged out explicitly.
    fn on_logged_out(&self) {
        self.on_session_lost();
    }
}

/// Identity of the signed-in user, read from the access token's claims.
#[derive(Debug, Default)]
pub struct IdentityState {
    claims: RwLock<Option<IdentityClaims>>,
}

impl IdentityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_credential(credential: Option<&AccessCredential>) -> Self {
        Self {
            claims: RwLock::new(credential.and_then(AccessCredential::claims)),
        }
    }

    pub fn current(&self) -> Option<IdentityClaims> {
        self.claims
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn role(&self) -> Option<String> {
        self.current().and_then(|claims| claims.role)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    fn replace(&self, claims: Option<IdentityClaims>) {
        *self.claims.write().unwrap_or_else(PoisonError::into_inner) = claims;
    }
}

impl SessionSink for IdentityState {
    fn on_renewed(&self, credential: &AccessCredential) {
        let claims = credential.claims();
        if claims.is_none() {
            // keep using the token, but don't trust a stale identity
            warn!("session.identity_undecodable");
        }
        self.replace(claims);
    }

    fn on_session_lost(&self) {
        info!("session.lost");
        self.replace(None);
    }

    fn on_logged_out(&self) {
        info!("session.logged_out");
        self.replace(None);
    }
}
