//! Conversion orchestrator
//!
//! Owns the transfer state machine:
//!
//! ```text
//! Idle -> Probing -> Uploading -> AwaitingResponse -> Succeeded | Failed
//! ```
//!
//! Each submission gets an [`AttemptId`] and a cancellation token. A new
//! submission cancels the previous token, and every state write checks that
//! the writer is still the current attempt, so late results of superseded
//! attempts never reach the published state.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConversionFailure, ErrorKind, ValidationError};
use crate::probe::{ConnectivityProber, ProbeReport};
use crate::request::ConversionForm;
use crate::response::ConversionOutcome;
use crate::service::TranscriptionService;
use crate::transfer::{TimerGauge, TransferController};

/// Identity of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TransferState {
    #[default]
    Idle,
    Probing,
    Uploading,
    AwaitingResponse,
    Succeeded,
    Failed,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Succeeded | TransferState::Failed)
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            TransferState::Probing | TransferState::Uploading | TransferState::AwaitingResponse
        )
    }
}

/// Progress text key shown by the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressMessage {
    Preparing,
    Uploading,
    AwaitingResponse,
    Done,
}

impl ProgressMessage {
    pub fn text(&self, messages: &crate::locale::Messages) -> &'static str {
        match self {
            ProgressMessage::Preparing => messages.preparing,
            ProgressMessage::Uploading => messages.uploading,
            ProgressMessage::AwaitingResponse => messages.awaiting,
            ProgressMessage::Done => messages.done,
        }
    }
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionSnapshot {
    pub attempt: Option<AttemptId>,
    pub state: TransferState,
    pub progress: Option<ProgressMessage>,
    pub outcome: Option<ConversionOutcome>,
    pub probe: Option<ProbeReport>,
}

/// One applied transition, in order
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub attempt: Option<AttemptId>,
    pub state: TransferState,
    pub progress: Option<ProgressMessage>,
}

/// What the submitter gets back once its attempt settles
#[derive(Debug, Clone)]
pub struct AttemptReport {
    pub attempt: AttemptId,
    pub outcome: ConversionOutcome,
    /// False when a newer submission superseded this one before it settled
    pub applied: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct CurrentAttempt {
    counter: u64,
    id: Option<AttemptId>,
    token: Option<CancellationToken>,
}

const EVENT_CAPACITY: usize = 64;

pub struct ConversionOrchestrator<S: ?Sized> {
    prober: ConnectivityProber<S>,
    transfer: TransferController<S>,
    snapshot: watch::Sender<ConversionSnapshot>,
    events: broadcast::Sender<StateChange>,
    current: Mutex<CurrentAttempt>,
}

impl<S: TranscriptionService + ?Sized> ConversionOrchestrator<S> {
    pub fn new(service: Arc<S>) -> Self {
        let (snapshot, _) = watch::channel(ConversionSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            prober: ConnectivityProber::new(Arc::clone(&service)),
            transfer: TransferController::new(service),
            snapshot,
            events,
            current: Mutex::new(CurrentAttempt::default()),
        }
    }

    pub fn from_config(service: Arc<S>, config: &Config) -> Self {
        Self::new(service)
            .with_upload_timeout(config.upload_timeout())
            .with_probe_timeout(config.probe_timeout())
    }

    pub fn with_upload_timeout(mut self, limit: Duration) -> Self {
        self.transfer = self.transfer.with_timeout(limit);
        self
    }

    pub fn with_probe_timeout(mut self, limit: Duration) -> Self {
        self.prober = self.prober.with_timeout(limit);
        self
    }

    pub fn with_timer_gauge(mut self, gauge: TimerGauge) -> Self {
        self.transfer = self.transfer.with_gauge(gauge);
        self
    }

    pub fn timer_gauge(&self) -> &TimerGauge {
        self.transfer.gauge()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ConversionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> TransferState {
        self.snapshot.borrow().state
    }

    /// Validate `form` and start a new attempt.
    ///
    /// Validation happens here, synchronously: an invalid form leaves the
    /// state untouched and never reaches the network. A valid form preempts
    /// any attempt in flight and moves to `Probing` immediately; the returned
    /// future drives the attempt to its terminal state and must be awaited.
    pub fn submit(
        &self,
        form: &ConversionForm,
    ) -> Result<impl Future<Output = AttemptReport> + '_, ValidationError> {
        let (request, endpoint) = form.build().map_err(|e| {
            warn!("❌ Submission rejected: {}", e);
            e
        })?;

        let (attempt, token) = self.begin();
        let started_at = Utc::now();

        info!(
            "🎬 Attempt {} started: {} ({:.2} MB), model={}, language={}, subtitles={}, diarization={}, beam={}",
            attempt,
            request.file.name,
            request.file.size_mb(),
            request.model,
            request.language,
            request.with_subtitles,
            request.diarization_enabled,
            request.beam_size,
        );

        // lives in the future so dropping it unpolled still abandons the attempt
        let guard = AttemptGuard {
            orchestrator: self,
            attempt,
            settled: false,
        };

        Ok(async move {
            // rebind so the whole guard moves in, not just `settled`
            let mut guard = guard;
            let started = Instant::now();

            let probe = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                report = self.prober.probe() => Some(report),
            };

            let outcome = match probe {
                None => ConversionOutcome::Failure(ConversionFailure::superseded()),
                Some(probe) => {
                    self.apply(attempt, |s| {
                        s.state = TransferState::Uploading;
                        s.progress = Some(ProgressMessage::Uploading);
                        s.probe = Some(probe.clone());
                    });

                    let (body_sent, sent) = oneshot::channel();
                    let transfer = self.transfer.execute(&request, endpoint, &token, body_sent);
                    tokio::pin!(transfer);

                    let outcome = tokio::select! {
                        biased;
                        outcome = &mut transfer => outcome,
                        Ok(()) = sent => {
                            debug!("Attempt {} body sent, awaiting response", attempt);
                            self.apply(attempt, |s| {
                                s.state = TransferState::AwaitingResponse;
                                s.progress = Some(ProgressMessage::AwaitingResponse);
                            });
                            transfer.await
                        }
                    };

                    annotate_with_probe(outcome, &probe)
                }
            };

            let applied = self.finish(attempt, &outcome);
            guard.settled = true;
            let elapsed = started.elapsed();

            let outcome = if applied {
                match &outcome {
                    ConversionOutcome::Success(success) => info!(
                        "🎉 Attempt {} succeeded in {:.2}s: {} characters, {} segments",
                        attempt,
                        elapsed.as_secs_f64(),
                        success.text.chars().count(),
                        success.segments.len()
                    ),
                    ConversionOutcome::Failure(failure) => warn!(
                        "❌ Attempt {} failed in {:.2}s ({}): {}",
                        attempt,
                        elapsed.as_secs_f64(),
                        failure.kind,
                        failure
                    ),
                }
                outcome
            } else {
                debug!("Discarding result of superseded attempt {}", attempt);
                ConversionOutcome::Failure(ConversionFailure::superseded())
            };

            AttemptReport {
                attempt,
                outcome,
                applied,
                started_at,
                elapsed,
            }
        })
    }

    /// Cancel any attempt in flight and return to `Idle`
    pub fn reset(&self) {
        let mut current = self.current.lock();
        if let Some(token) = current.token.take() {
            token.cancel();
        }
        current.id = None;
        self.publish(ConversionSnapshot::default());
    }

    fn begin(&self) -> (AttemptId, CancellationToken) {
        let mut current = self.current.lock();
        if let Some(previous) = current.token.take() {
            if let Some(id) = current.id {
                info!("⏭️ Attempt {} superseded by a new submission", id);
            }
            previous.cancel();
        }

        current.counter += 1;
        let attempt = AttemptId(current.counter);
        let token = CancellationToken::new();
        current.id = Some(attempt);
        current.token = Some(token.clone());

        self.publish(ConversionSnapshot {
            attempt: Some(attempt),
            state: TransferState::Probing,
            progress: Some(ProgressMessage::Preparing),
            outcome: None,
            probe: None,
        });

        (attempt, token)
    }

    /// Apply `update` only if `attempt` is still current
    fn apply(&self, attempt: AttemptId, update: impl FnOnce(&mut ConversionSnapshot)) -> bool {
        let current = self.current.lock();
        if current.id != Some(attempt) {
            return false;
        }

        let mut change = None;
        self.snapshot.send_modify(|snapshot| {
            update(snapshot);
            change = Some(StateChange {
                attempt: snapshot.attempt,
                state: snapshot.state,
                progress: snapshot.progress,
            });
        });
        if let Some(change) = change {
            let _ = self.events.send(change);
        }
        true
    }

    fn finish(&self, attempt: AttemptId, outcome: &ConversionOutcome) -> bool {
        let applied = self.apply(attempt, |s| {
            match outcome {
                ConversionOutcome::Success(_) => {
                    s.state = TransferState::Succeeded;
                    s.progress = Some(ProgressMessage::Done);
                }
                ConversionOutcome::Failure(_) => {
                    s.state = TransferState::Failed;
                    s.progress = None;
                }
            }
            s.outcome = Some(outcome.clone());
        });

        if applied {
            let mut current = self.current.lock();
            if current.id == Some(attempt) {
                current.token = None;
            }
        }
        applied
    }

    /// Called when an attempt's future is dropped before settling
    fn abandon(&self, attempt: AttemptId) {
        let mut current = self.current.lock();
        if current.id != Some(attempt) {
            return;
        }
        if let Some(token) = current.token.take() {
            token.cancel();
        }
        current.id = None;
        debug!("Attempt {} abandoned before settling", attempt);
        self.publish(ConversionSnapshot::default());
    }

    fn publish(&self, snapshot: ConversionSnapshot) {
        let change = StateChange {
            attempt: snapshot.attempt,
            state: snapshot.state,
            progress: snapshot.progress,
        };
        self.snapshot.send_replace(snapshot);
        let _ = self.events.send(change);
    }
}

fn annotate_with_probe(outcome: ConversionOutcome, probe: &ProbeReport) -> ConversionOutcome {
    match (outcome, probe.diagnostic()) {
        (ConversionOutcome::Failure(failure), Some(note))
            if failure.kind != ErrorKind::AbortedBySupersession =>
        {
            ConversionOutcome::Failure(failure.with_probe_note(note))
        }
        (outcome, _) => outcome,
    }
}

struct AttemptGuard<'a, S: TranscriptionService + ?Sized> {
    orchestrator: &'a ConversionOrchestrator<S>,
    attempt: AttemptId,
    settled: bool,
}

impl<S: TranscriptionService + ?Sized> Drop for AttemptGuard<'_, S> {
    fn drop(&mut self) {
        if !self.settled {
            self.orchestrator.abandon(self.attempt);
        }
    }
}
