//! Advisory connectivity preflight
//!
//! The probe never blocks or aborts a conversion. Its report is only used
//! for logging and to annotate a failure of the real upload.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::service::TranscriptionService;

/// Default probe timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeFailure {
    Timeout,
    Network(String),
    Status(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeReport {
    Reachable {
        payload: serde_json::Value,
        elapsed: Duration,
    },
    Unreachable {
        reason: ProbeFailure,
        elapsed: Duration,
    },
}

impl ProbeReport {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeReport::Reachable { .. })
    }

    /// Short diagnostic suitable for appending to an error message
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            ProbeReport::Reachable { .. } => None,
            ProbeReport::Unreachable { reason, .. } => Some(match reason {
                ProbeFailure::Timeout => "health check timed out".to_string(),
                ProbeFailure::Network(msg) => format!("health check failed: {}", msg),
                ProbeFailure::Status(code) => format!("health check returned HTTP {}", code),
            }),
        }
    }
}

pub struct ConnectivityProber<S: ?Sized> {
    service: Arc<S>,
    limit: Duration,
}

impl<S: TranscriptionService + ?Sized> ConnectivityProber<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            limit: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    pub async fn probe(&self) -> ProbeReport {
        let started = Instant::now();
        let result = timeout(self.limit, self.service.health()).await;
        let elapsed = started.elapsed();

        let report = match result {
            Ok(Ok(payload)) => ProbeReport::Reachable { payload, elapsed },
            Ok(Err(TransportError::Status(code))) => ProbeReport::Unreachable {
                reason: ProbeFailure::Status(code),
                elapsed,
            },
            Ok(Err(e)) => ProbeReport::Unreachable {
                reason: ProbeFailure::Network(e.to_string()),
                elapsed,
            },
            Err(_) => ProbeReport::Unreachable {
                reason: ProbeFailure::Timeout,
                elapsed,
            },
        };

        match &report {
            ProbeReport::Reachable { payload, elapsed } => {
                info!("✓ Backend reachable in {:.2}s: {}", elapsed.as_secs_f64(), payload);
            }
            ProbeReport::Unreachable { .. } => {
                warn!(
                    "✗ Backend unreachable ({}), continuing with upload",
                    report.diagnostic().unwrap_or_default()
                );
            }
        }

        report
    }
}
