#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use marketplace_transport::{
    AccessCredential, Config, CredentialStore, SessionSink, TransportClient,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
pub struct RecordingSink {
    pub renewed: Mutex<Vec<String>>,
    pub lost: AtomicUsize,
}

impl RecordingSink {
    pub fn lost_count(&self) -> usize {
        self.lost.load(Ordering::SeqCst)
    }

    pub fn renewed(&self) -> Vec<String> {
        self.renewed.lock().unwrap().clone()
    }
}

impl SessionSink for RecordingSink {
    fn on_renewed(&self, credential: &AccessCredential) {
        self.renewed
            .lock()
            .unwrap()
            .push(credential.value().to_string());
    }

    fn on_session_lost(&self) {
        self.lost.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub client: TransportClient,
    pub store: CredentialStore,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(config: Config, token: Option<&str>) -> Harness {
    let store = CredentialStore::new();
    if let Some(token) = token {
        store.set(AccessCredential::new(token));
    }
    let sink = Arc::new(RecordingSink::default());
    let client = TransportClient::builder(config)
        .credential_store(store.clone())
        .session_sink(sink.clone())
        .build()
        .expect("client builds");
    Harness {
        client,
        store,
        sink,
    }
}

pub fn signed_in(server: &MockServer, token: &str) -> Harness {
    harness(Config::from_values(server.uri(), Some(5), Some(2), None), Some(token))
}

/// `GET {route}` answers 200 only for `Bearer {token}` and 401 otherwise.
pub async fn mount_protected(server: &MockServer, route: &str, token: &str, replays: u64, rejects: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(route.to_string()))
        .with_priority(1)
        .expect(replays)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401).set_body_string(format!("{route} expired")))
        .expect(rejects)
        .mount(server)
        .await;
}
