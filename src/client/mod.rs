use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Url;

use crate::config::Config;
use crate::credential::{CredentialRecord, CredentialStore, FileRecord, MemoryRecord};
use crate::errors::Error;
use crate::refresh::RefreshCoordinator;
use crate::session::{IdentityState, SessionSink};

mod impls;
mod intercept;
mod renewal;

/// HTTP client that attaches the current bearer credential to every call and
/// renews it transparently when the server answers 401.
///
/// Cheap to clone; clones share the credential store and the refresh coordinator.
#[derive(Clone)]
pub struct TransportClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    http: reqwest::Client,
    base: Url,
    refresh_url: Url,
    logout_url: Url,
    request_timeout: Option<Duration>,
    refresh_timeout: Duration,
    store: CredentialStore,
    coordinator: RefreshCoordinator,
    sink: Arc<dyn SessionSink>,
    identity: Option<Arc<IdentityState>>,
    session: Mutex<u64>,
}

impl TransportClient {
    /// Builds a client with a store restored from `config.credential_path`
    /// (in-memory when unset) and an [`IdentityState`] session sink.
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> TransportClientBuilder {
        TransportClientBuilder {
            config,
            http: None,
            store: None,
            coordinator: None,
            sink: None,
        }
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// The identity kept by the default session sink. `None` when a custom
    /// sink was supplied to the builder.
    pub fn identity(&self) -> Option<&IdentityState> {
        self.inner.identity.as_deref()
    }
}

/// Wires a [`TransportClient`] from its collaborators.
pub struct TransportClientBuilder {
    config: Config,
    http: Option<reqwest::Client>,
    store: Option<CredentialStore>,
    coordinator: Option<RefreshCoordinator>,
    sink: Option<Arc<dyn SessionSink>>,
}

impl TransportClientBuilder {
    /// Custom HTTP client. It must keep a cookie store, since renewal relies
    /// on the refresh cookie being sent automatically.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn credential_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn coordinator(mut self, coordinator: RefreshCoordinator) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn session_sink(mut self, sink: Arc<dyn SessionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<TransportClient, Error> {
        let base = self.config.base()?;
        let refresh_url = join_url(&base, &self.config.refresh_path)?;
        let logout_url = join_url(&base, &self.config.logout_path)?;

        let store = match self.store {
            Some(store) => store,
            None => {
                let record: Arc<dyn CredentialRecord> = match &self.config.credential_path {
                    Some(path) => Arc::new(FileRecord::new(path)),
                    None => Arc::new(MemoryRecord::default()),
                };
                CredentialStore::restore(record)
            }
        };
        let (sink, identity) = match self.sink {
            Some(sink) => (sink, None),
            None => {
                let identity = Arc::new(IdentityState::from_credential(store.get().as_ref()));
                let sink: Arc<dyn SessionSink> = identity.clone();
                (sink, Some(identity))
            }
        };
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .cookie_store(true)
                .user_agent(concat!("marketplace-transport/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?,
        };

        Ok(TransportClient {
            inner: Arc::new(ClientInner {
                http,
                base,
                refresh_url,
                logout_url,
                request_timeout: self.config.request_timeout(),
                refresh_timeout: self.config.refresh_timeout(),
                store,
                coordinator: self.coordinator.unwrap_or_default(),
                sink,
                identity,
                session: Mutex::new(0),
            }),
        })
    }
}

impl ClientInner {
    /// Generation of the signed-in session, bumped by logout. Held while the
    /// store is written so a renewal and a logout never interleave.
    fn session(&self) -> MutexGuard<'_, u64> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Appends `path` to `base` the way a base URL prefix works, keeping any base path.
/// Absolute URLs pass through unchanged.
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, Error> {
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };
    Url::parse(&raw).map_err(|e| Error::Config(format!("Invalid request URL '{raw}': {e}")))
}
