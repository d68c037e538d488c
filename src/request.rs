use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::credential::AccessCredential;
use crate::errors::Error;

/// Per-call options for [`TransportClient`](crate::TransportClient) requests.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sends `token` instead of the stored credential on the first attempt.
    pub fn with_bearer(self, token: &str) -> Result<Self, Error> {
        let value = AccessCredential::new(token).header_value()?;
        Ok(self.with_header(AUTHORIZATION, value))
    }

    /// Overrides the client's default request timeout for this call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A call captured by its invocation parameters so it can be replayed.
#[derive(Clone, Debug)]
pub(crate) struct PendingRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
    pub options: RequestOptions,
    /// Set once the request has been through a renewal; never renews twice.
    pub retried: bool,
}

impl PendingRequest {
    pub fn new(
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Self {
        Self {
            method,
            url,
            body,
            options,
            retried: false,
        }
    }

    /// Replays carry the renewed credential even if the caller set their own header.
    pub fn authorize(&mut self, credential: &AccessCredential) -> Result<(), Error> {
        self.options
            .headers
            .insert(AUTHORIZATION, credential.header_value()?);
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.url.path())
    }
}
