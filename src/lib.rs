//! Authenticated HTTP transport for the marketplace API.
//!
//! [`TransportClient`] attaches the current bearer credential to every call.
//! When the server answers 401 it renews the credential through the refresh
//! endpoint and replays the request once. Concurrent 401s share a single
//! renewal call coordinated by [`RefreshCoordinator`]; if renewal fails every
//! waiting caller gets its own original 401 and the session is torn down
//! through the [`SessionSink`].

mod client;
mod config;
pub mod credential;
mod errors;
pub mod refresh;
mod request;
mod session;
pub mod telemetry;

pub use client::{TransportClient, TransportClientBuilder};
pub use config::Config;
pub use credential::{AccessCredential, CredentialStore, IdentityClaims};
pub use errors::Error;
pub use refresh::{RefreshCoordinator, RenewalOutcome, RenewalTicket};
pub use request::RequestOptions;
pub use reqwest::{Method, Response, StatusCode};
pub use session::{IdentityState, SessionSink};
