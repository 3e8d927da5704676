//! Error type shared by every layer of the client core.

use thiserror::Error;

/// Client core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Connection, TLS, timeout or body read failure.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The authenticate endpoint returned something other than `loginsuccess`.
    /// The payload is the backend's code, verbatim.
    #[error("Login failed: {0}")]
    LoginFailure(String),

    #[error("No username and password supplied")]
    MissingCredentials,

    #[error("Unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse {
        endpoint: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn unexpected(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            endpoint,
            reason: reason.into(),
        }
    }

    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failure_carries_code_verbatim() {
        let err = Error::LoginFailure("loginlocked".to_string());
        assert_eq!(err.to_string(), "Login failed: loginlocked");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn http_error_exposes_status() {
        let err = Error::Http {
            status: 503,
            url: "https://www.espnplayer.com/schedule".to_string(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("503"));
    }
}
