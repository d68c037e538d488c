use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::Error;
use crate::request::{PendingRequest, RequestOptions};

use super::{TransportClient, join_url};

impl TransportClient {
    /// Performs one logical request, renewing the credential at most once on 401.
    ///
    /// `path` is appended to the base URL unless it is already absolute.
    /// Fails with [`Error::Network`] when no response arrives and
    /// [`Error::Http`] for non-2xx answers.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let url = join_url(&self.inner.base, path)?;
        self.dispatch(PendingRequest::new(method, url, body, options))
            .await
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), options).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body), options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Response, Error> {
        self.request(Method::DELETE, path, None, options).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self.get(path, RequestOptions::default()).await?;
        decode_json(resp).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let resp = self.post(path, body, RequestOptions::default()).await?;
        decode_json(resp).await
    }

    /// Sends one attempt. The stored credential is attached unless the request
    /// already carries an `Authorization` header.
    pub(crate) async fn send(&self, pending: &PendingRequest) -> Result<Response, Error> {
        let mut builder = self
            .inner
            .http
            .request(pending.method.clone(), pending.url.clone())
            .headers(pending.options.headers.clone());
        if !pending.options.headers.contains_key(AUTHORIZATION)
            && let Some(credential) = self.inner.store.get()
        {
            builder = builder.header(AUTHORIZATION, credential.header_value()?);
        }
        if let Some(timeout) = pending.options.timeout.or(self.inner.request_timeout) {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &pending.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.inspect_err(|err| {
            warn!(
                method = %pending.method,
                url = %pending.url,
                timeout = err.is_timeout(),
                error = %err,
                "request.no_response"
            );
        })?;
        let status = resp.status();
        if status.is_success() {
            debug!(method = %pending.method, url = %pending.url, status = status.as_u16(), "request.ok");
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!(
            method = %pending.method,
            url = %pending.url,
            status = status.as_u16(),
            retried = pending.retried,
            "request.failed"
        );
        Err(Error::Http { status, body })
    }
}

async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
