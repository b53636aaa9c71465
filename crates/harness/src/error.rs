//! Error types for the harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// Missing or malformed harness/launch settings. Raised before any
    /// process is started.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server failed to start: {0}")]
    Startup(String),

    /// No HTTP response was ever received from the health endpoint.
    #[error("Health probe of {url} never got a response: {source}")]
    Probe {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server for '{key}' is not ready")]
    NotReady { key: String },

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("{url} returned {status}: {body}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// Only ever logged by the launcher; teardown does not propagate errors.
    #[error("Teardown error: {0}")]
    Teardown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
