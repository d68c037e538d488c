//! read client configuration from a file, the environment, or explicit values

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use crate::errors::Error;

const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
const DEFAULT_LOGOUT_PATH: &str = "/auth/logout";
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub refresh_timeout_secs: Option<u64>,
    /// Where the access credential is mirrored between runs. In-memory only when unset.
    #[serde(default)]
    pub credential_path: Option<PathBuf>,
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// # ENV Vars
    /// * `MARKETPLACE_API_URL` - base URL of the resource server (required)
    /// * `MARKETPLACE_CREDENTIAL_PATH` - file the access credential is mirrored to
    /// * `MARKETPLACE_REQUEST_TIMEOUT_SECS` - default per-request timeout
    /// * `MARKETPLACE_REFRESH_TIMEOUT_SECS` - timeout for the renewal call
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("MARKETPLACE_API_URL")
            .map_err(|_| Error::Config("Missing MARKETPLACE_API_URL env var".to_string()))?;
        Ok(Self {
            base_url,
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            request_timeout_secs: read_secs_from_env("MARKETPLACE_REQUEST_TIMEOUT_SECS")?,
            refresh_timeout_secs: read_secs_from_env("MARKETPLACE_REFRESH_TIMEOUT_SECS")?,
            credential_path: std::env::var_os("MARKETPLACE_CREDENTIAL_PATH").map(PathBuf::from),
        })
    }

    pub fn from_values(
        base_url: impl Into<String>,
        request_timeout_secs: Option<u64>,
        refresh_timeout_secs: Option<u64>,
        credential_path: Option<PathBuf>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            request_timeout_secs,
            refresh_timeout_secs,
            credential_path,
        }
    }

    /// Parses `base_url`, prefixing `https://` when no scheme is given.
    pub fn base(&self) -> Result<Url, Error> {
        let raw = if self.base_url.contains("://") {
            self.base_url.clone()
        } else {
            format!("https://{}", self.base_url)
        };
        Url::parse(&raw)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(
            self.refresh_timeout_secs
                .unwrap_or(DEFAULT_REFRESH_TIMEOUT_SECS),
        )
    }
}

fn read_secs_from_env(name: &str) -> Result<Option<u64>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} must be a whole number of seconds"))),
        Err(_) => Ok(None),
    }
}
