use std::fmt;

use thiserror::Error;

/// Stable machine-readable codes carried by [`FetchError::Business`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    AuthError,
    RateLimit,
    CityNotFound,
    ApiKeyError,
    RateLimitExceeded,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AuthError => "AUTH_ERROR",
            ErrorCode::RateLimit => "RATE_LIMIT",
            ErrorCode::CityNotFound => "CITY_NOT_FOUND",
            ErrorCode::ApiKeyError => "API_KEY_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced a [`FetchError::Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCause {
    /// Connection-level failure reported by the transport.
    Transport,
    /// 5xx or an unclassified non-2xx status.
    Status,
    /// The per-attempt timer fired.
    TimedOut,
    /// The caller's cancellation token fired.
    Cancelled,
    /// Anything that is neither a transport nor a status failure (bad JSON, etc.).
    Unclassified,
}

/// Outcome classification for every request made through [`crate::fetch`].
///
/// `Network` failures are transient and may be retried. `Business` failures
/// describe a request that reached the server but can never succeed as sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("{message}")]
    Network {
        message: String,
        status: Option<u16>,
        cause: NetworkCause,
    },

    #[error("{message}")]
    Business {
        message: String,
        code: ErrorCode,
        status: Option<u16>,
    },
}

pub(crate) const CANCELLED_MESSAGE: &str = "request was cancelled";

impl FetchError {
    pub fn network(message: impl Into<String>, status: Option<u16>, cause: NetworkCause) -> Self {
        FetchError::Network {
            message: message.into(),
            status,
            cause,
        }
    }

    pub fn business(message: impl Into<String>, code: ErrorCode, status: Option<u16>) -> Self {
        FetchError::Business {
            message: message.into(),
            code,
            status,
        }
    }

    pub fn cancelled(cause: NetworkCause) -> Self {
        Self::network(CANCELLED_MESSAGE, None, cause)
    }

    /// Map a non-2xx HTTP status to an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            s if s >= 500 => {
                Self::network(format!("server error (HTTP {s})"), Some(s), NetworkCause::Status)
            }
            404 => Self::business("resource not found", ErrorCode::NotFound, Some(404)),
            401 | 403 => Self::business(
                format!("access denied (HTTP {status})"),
                ErrorCode::AuthError,
                Some(status),
            ),
            429 => Self::business("too many requests", ErrorCode::RateLimit, Some(429)),
            s => Self::network(format!("unexpected HTTP status {s}"), Some(s), NetworkCause::Status),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FetchError::Network { message, .. } | FetchError::Business { message, .. } => message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Network { status, .. } | FetchError::Business { status, .. } => *status,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            FetchError::Business { code, .. } => Some(*code),
            FetchError::Network { .. } => None,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            FetchError::Network {
                cause: NetworkCause::Cancelled | NetworkCause::TimedOut,
                ..
            }
        )
    }
}

/// Failure below HTTP: DNS, connect, TLS, reading the body.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}
