//! Remote catalog error types

use std::time::Duration;
use thiserror::Error;

/// Catalog error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl CatalogError {
    pub fn new(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Connect, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Timeout, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::NotFound, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Decode, message)
    }

    /// Classify a non-success HTTP status from the catalog API
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        match status.as_u16() {
            401 | 403 => Self::auth(format!("Rejected credentials ({status}): {snippet}")),
            404 => Self::not_found(format!("Not found: {snippet}")),
            408 => Self::timeout(format!("Request timed out upstream: {snippet}")),
            429 => Self::rate_limit(format!("Rate limited: {snippet}")),
            500..=599 => Self::server_error(format!("Server error ({status}): {snippet}")),
            _ => Self::invalid_request(format!("Rejected ({status}): {snippet}")),
        }
    }

    /// Classify a transport-level failure from reqwest
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            Self::connect(format!("Could not connect: {err}"))
        } else if err.is_timeout() {
            Self::timeout(format!("Request timed out: {err}"))
        } else if err.is_decode() {
            Self::decode(format!("Malformed response: {err}"))
        } else {
            Self::network(format!("Request failed: {err}"))
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Connection could not be established; the request never reached the server
    Connect,
    /// Connection reset or other transport failure mid-request - retryable
    Network,
    /// Request exceeded its deadline - retryable
    Timeout,
    /// Rate limited (429) - retryable with backoff
    RateLimit,
    /// Server error (5xx) - retryable
    ServerError,
    /// Authentication failed (401, 403) or missing credential - not retryable
    Auth,
    /// Validation or other 4xx rejection - not retryable
    InvalidRequest,
    /// Record does not exist
    NotFound,
    /// Response body did not match the expected shape
    Decode,
}

impl CatalogErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Connect | Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }

    /// Whether a non-idempotent create can be resent without risking a duplicate
    pub fn is_safe_to_resend(self) -> bool {
        matches!(self, Self::Connect | Self::RateLimit)
    }
}
