//! # Platform Errors
//!
//! Every failure of the platform API is classified here; raw transport errors
//! do not leave the client.

use crate::controller::retry::ErrorClass;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform entity not found: {0}")]
    NotFound(String),
    #[error("platform conflict: {0}")]
    Conflict(String),
    #[error("transient platform failure: {0}")]
    Transient(String),
    #[error("platform rejected the request: {0}")]
    Fatal(String),
    #[error("platform request timed out: {0}")]
    Timeout(String),
}

impl PlatformError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            PlatformError::NotFound(_) => ErrorClass::NotFound,
            PlatformError::Conflict(_) => ErrorClass::Conflict,
            PlatformError::Transient(_) => ErrorClass::Transient,
            PlatformError::Fatal(_) => ErrorClass::Fatal,
            PlatformError::Timeout(_) => ErrorClass::Timeout,
        }
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", truncate(body, 512))
        };
        match status.as_u16() {
            404 => PlatformError::NotFound(message),
            409 | 412 => PlatformError::Conflict(message),
            408 | 429 => PlatformError::Transient(message),
            500..=599 => PlatformError::Transient(message),
            _ => PlatformError::Fatal(message),
        }
    }

    /// Metric label for the result of a request
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            PlatformError::NotFound(_) => "not_found",
            PlatformError::Conflict(_) => "conflict",
            PlatformError::Transient(_) => "transient",
            PlatformError::Fatal(_) => "fatal",
            PlatformError::Timeout(_) => "timeout",
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlatformError::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            PlatformError::from_status(status, "")
        } else {
            PlatformError::Transient(err.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
