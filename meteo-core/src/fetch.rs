//! GET-and-parse-JSON with a per-attempt timeout, caller cancellation and
//! exponential-backoff retries.
//!
//! Every failure leaving [`fetch_json`] is a classified [`FetchError`]:
//!
//! | status       | kind     | code         |
//! |--------------|----------|--------------|
//! | >= 500       | Network  |              |
//! | 404          | Business | `NOT_FOUND`  |
//! | 401, 403     | Business | `AUTH_ERROR` |
//! | 429          | Business | `RATE_LIMIT` |
//! | other non-2xx| Network  |              |
//!
//! Only status and transport failures of the Network kind are retried.
//! A timeout or cancellation ends the call on the spot.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    cancel::CancellationToken,
    error::{FetchError, NetworkCause, TransportError},
    http::{HttpRequest, HttpResponse, HttpTransport},
};

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const NOT_MODIFIED: u16 = 304;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Delay before retry `n` (0-based) is `backoff * 2^n`.
    pub backoff: Duration,
    /// Budget for a single attempt.
    pub timeout: Duration,
    pub cancel: Option<CancellationToken>,
    pub headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_TIMEOUT,
            cancel: None,
            headers: Vec::new(),
        }
    }
}

impl FetchOptions {
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cancel(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn caller_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Successful response. For `304 Not Modified`, `data` is `Null`.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub data: Value,
    pub headers: HeaderMap,
    pub status: u16,
}

impl FetchResponse {
    pub fn is_not_modified(&self) -> bool {
        self.status == NOT_MODIFIED
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub type RequestOutcome = Result<FetchResponse, FetchError>;

#[derive(Debug)]
enum AttemptError {
    Classified(FetchError),
    Transport(TransportError),
    Decode(serde_json::Error),
    TimedOut,
    Aborted,
}

impl AttemptError {
    fn is_network(&self) -> bool {
        matches!(
            self,
            AttemptError::Classified(FetchError::Network { .. }) | AttemptError::Transport(_)
        )
    }
}

pub async fn fetch_json(
    transport: &dyn HttpTransport,
    url: &str,
    options: &FetchOptions,
) -> RequestOutcome {
    let request = HttpRequest {
        url: url.to_string(),
        headers: options.headers.clone(),
    };

    let mut attempts = 0;
    let mut last_error = None;

    for attempt in 0..=options.retries {
        attempts = attempt + 1;
        debug!(url, attempt = attempts, "sending request");

        let error = match run_attempt(transport, &request, options).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        match error {
            _ if options.caller_cancelled() => {
                warn!(url, "request cancelled by caller");
                return Err(FetchError::cancelled(NetworkCause::Cancelled));
            }
            AttemptError::Aborted => {
                return Err(FetchError::cancelled(NetworkCause::Cancelled));
            }
            AttemptError::TimedOut => {
                warn!(url, timeout_ms = options.timeout.as_millis() as u64, "request timed out");
                return Err(FetchError::cancelled(NetworkCause::TimedOut));
            }
            AttemptError::Classified(err @ FetchError::Business { .. }) => return Err(err),
            err if err.is_network() && attempt < options.retries => {
                let delay = options.backoff * 2u32.saturating_pow(attempt);
                warn!(
                    url,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %describe(&err),
                    "retrying after network failure"
                );
                backoff(delay, options.cancel.as_ref()).await;
                last_error = Some(err);
            }
            err => {
                last_error = Some(err);
                break;
            }
        }
    }

    Err(match last_error {
        Some(AttemptError::Classified(err)) => err,
        Some(AttemptError::Transport(err)) => FetchError::network(
            exhausted_message(attempts, &err.to_string()),
            None,
            NetworkCause::Transport,
        ),
        Some(other) => FetchError::network(
            exhausted_message(attempts, &describe(&other)),
            None,
            NetworkCause::Unclassified,
        ),
        None => FetchError::network("request was never attempted", None, NetworkCause::Unclassified),
    })
}

async fn run_attempt(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    options: &FetchOptions,
) -> Result<FetchResponse, AttemptError> {
    let attempt_token = match &options.cancel {
        Some(parent) => parent.child_token(),
        None => CancellationToken::new(),
    };

    // The timer lives only inside this select; it is dropped on every branch.
    let response: HttpResponse = tokio::select! {
        biased;
        _ = attempt_token.cancelled() => return Err(AttemptError::Aborted),
        _ = tokio::time::sleep(options.timeout) => {
            attempt_token.cancel();
            return Err(AttemptError::TimedOut);
        }
        res = transport.get(request) => res.map_err(AttemptError::Transport)?,
    };

    let status = response.status;
    if status == NOT_MODIFIED {
        debug!(url = %request.url, "not modified");
        return Ok(FetchResponse {
            data: Value::Null,
            headers: response.headers,
            status,
        });
    }
    if !(200..300).contains(&status) {
        return Err(AttemptError::Classified(FetchError::from_status(status)));
    }

    let data = serde_json::from_slice(&response.body).map_err(AttemptError::Decode)?;

    Ok(FetchResponse {
        data,
        headers: response.headers,
        status,
    })
}

async fn backoff(delay: Duration, cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => {}
            }
        }
        None => tokio::time::sleep(delay).await,
    }
}

fn describe(err: &AttemptError) -> String {
    match err {
        AttemptError::Classified(e) => e.to_string(),
        AttemptError::Transport(e) => e.to_string(),
        AttemptError::Decode(e) => format!("invalid JSON body: {e}"),
        AttemptError::TimedOut => "timed out".to_string(),
        AttemptError::Aborted => "aborted".to_string(),
    }
}

fn exhausted_message(attempts: u32, cause: &str) -> String {
    let plural = if attempts == 1 { "" } else { "s" };
    format!("request failed after {attempts} attempt{plural}: {cause}")
}
