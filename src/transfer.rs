//! Transfer controller: one upload under one timeout/cancellation scope

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ConversionFailure;
use crate::request::{ConversionRequest, Endpoint};
use crate::response::{interpret_error_body, interpret_success, ConversionOutcome};
use crate::service::TranscriptionService;

/// Default upper bound on a single upload, response included
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Counts armed timers so leaks across submissions are observable
#[derive(Debug, Clone, Default)]
pub struct TimerGauge {
    active: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl TimerGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers currently armed
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Timers released since creation
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Cancelable timer bound to one transfer's token.
///
/// Released exactly once, either explicitly or on drop.
#[derive(Debug)]
pub struct TimeoutHandle {
    task: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
    gauge: TimerGauge,
}

impl TimeoutHandle {
    pub fn arm(limit: Duration, token: CancellationToken, gauge: TimerGauge) -> Self {
        gauge.acquire();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let task = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            error!("⏱️ Upload timed out after {:?}", limit);
            // flag before cancel so the transfer sees why it was cancelled
            flag.store(true, Ordering::SeqCst);
            token.cancel();
        });

        Self {
            task: Some(task),
            fired,
            gauge,
        }
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.gauge.release();
        }
    }
}

impl Drop for TimeoutHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Executes uploads and normalizes every exit path into a [`ConversionOutcome`]
pub struct TransferController<S: ?Sized> {
    service: Arc<S>,
    limit: Duration,
    gauge: TimerGauge,
}

impl<S: TranscriptionService + ?Sized> TransferController<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            limit: UPLOAD_TIMEOUT,
            gauge: TimerGauge::new(),
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_gauge(mut self, gauge: TimerGauge) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn gauge(&self) -> &TimerGauge {
        &self.gauge
    }

    pub fn timeout(&self) -> Duration {
        self.limit
    }

    /// Upload `request` and wait for the response.
    ///
    /// Cancelling `attempt` aborts the transfer with
    /// `AbortedBySupersession`; the internal timer aborts it with `Timeout`.
    pub async fn execute(
        &self,
        request: &ConversionRequest,
        endpoint: Endpoint,
        attempt: &CancellationToken,
        body_sent: oneshot::Sender<()>,
    ) -> ConversionOutcome {
        let token = attempt.child_token();
        let timer = TimeoutHandle::arm(self.limit, token.clone(), self.gauge.clone());
        let started = Instant::now();

        info!(
            "📤 Uploading {} ({:.2} MB) to {}",
            request.file.name,
            request.file.size_mb(),
            endpoint.path()
        );

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.service.upload(request, endpoint, body_sent) => Some(result),
        };

        let timed_out = timer.fired();
        timer.release();
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            None if timed_out => ConversionFailure::timeout(self.limit).into(),
            None => {
                debug!("Transfer cancelled by a newer submission after {:.2}s", elapsed);
                ConversionFailure::superseded().into()
            }
            Some(Err(e)) => {
                warn!("🌐 Network error after {:.2}s: {}", elapsed, e);
                ConversionFailure::network(e.to_string()).into()
            }
            Some(Ok(raw)) if !raw.is_success() => {
                let message = interpret_error_body(&raw.body);
                warn!("Service responded with HTTP {}: {}", raw.status, message);
                ConversionFailure::service(message).into()
            }
            Some(Ok(raw)) => {
                info!("✅ Upload finished in {:.2}s (HTTP {})", elapsed, raw.status);
                match interpret_success(&raw.body) {
                    Ok(success) => ConversionOutcome::Success(success),
                    Err(failure) => ConversionOutcome::Failure(failure),
                }
            }
        }
    }
}
