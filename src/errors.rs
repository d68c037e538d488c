use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No response arrived: connection failure, timeout, or an unreadable body.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    /// The renewal call failed or returned a payload without an access token.
    #[error("credential renewal failed: {0}")]
    Renewal(String),
    /// A request that was already replayed once with a renewed credential still got a 401.
    #[error("request unauthorized after credential renewal: HTTP {status}: {body}")]
    RetryExhausted { status: StatusCode, body: String },
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } | Error::RetryExhausted { status, .. } => Some(*status),
            Error::Network(err) => err.status(),
            _ => None,
        }
    }

    /// True for the plain 401 that starts the renewal protocol.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err)
    }
}
