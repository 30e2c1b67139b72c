//! Error taxonomy for conversion attempts
//!
//! Validation and transport problems are Rust errors; everything that reaches
//! the user as the outcome of an attempt is carried as a value in
//! [`ConversionFailure`] so the orchestrator can render it uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Rejected form input. Never reaches the network layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file selected")]
    NoFile,

    #[error("Selected file is empty: {0}")]
    EmptyFile(String),

    #[error("Speaker count must be at least 1")]
    InvalidSpeakerCount,

    #[error("Beam size must be at least 1")]
    InvalidBeamSize,
}

/// Failure of the HTTP transport before a usable response arrived.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Body(String),

    #[error("Invalid service URL: {0}")]
    Url(String),

    #[error("Cannot read upload file: {0}")]
    File(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else if err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::Url(err.to_string())
    }
}

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ValidationError,
    Timeout,
    NetworkError,
    ServiceError,
    AbortedBySupersession,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ValidationError => "validation error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network error",
            ErrorKind::ServiceError => "service error",
            ErrorKind::AbortedBySupersession => "aborted by newer submission",
        };
        f.write_str(name)
    }
}

/// A failed attempt as shown to the user: one kind, one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Connectivity probe diagnostics, attached only when the probe also failed
    pub probe_note: Option<String>,
}

impl ConversionFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            probe_note: None,
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Upload timed out after {:?}", limit),
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceError, message)
    }

    pub fn superseded() -> Self {
        Self::new(
            ErrorKind::AbortedBySupersession,
            "Attempt discarded because a newer submission started",
        )
    }

    pub fn with_probe_note(mut self, note: impl Into<String>) -> Self {
        self.probe_note = Some(note.into());
        self
    }
}

impl From<ValidationError> for ConversionFailure {
    fn from(err: ValidationError) -> Self {
        Self::new(ErrorKind::ValidationError, err.to_string())
    }
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(note) = &self.probe_note {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}
