//! Video-to-Text client
//!
//! Uploads a video to a remote transcription service and tracks the attempt
//! through probing, upload and response interpretation. Transcripts, subtitles
//! and per-speaker text come back as a typed outcome.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod locale;
pub mod orchestrator;
pub mod preferences;
pub mod probe;
pub mod request;
pub mod response;
pub mod service;
pub mod transfer;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ConversionFailure, ErrorKind, TransportError, ValidationError};
pub use crate::locale::{Messages, UiLanguage};
pub use crate::orchestrator::{
    AttemptId, AttemptReport, ConversionOrchestrator, ConversionSnapshot, ProgressMessage,
    StateChange, TransferState,
};
pub use crate::preferences::Preferences;
pub use crate::probe::{ConnectivityProber, ProbeReport};
pub use crate::request::{
    ConversionForm, ConversionRequest, Endpoint, Language, ModelSize, SubtitleFormat, VideoFile,
};
pub use crate::response::{ConversionOutcome, ConversionSuccess, Segment};
pub use crate::service::{HttpTranscriptionService, RawResponse, TranscriptionService};
pub use crate::transfer::{TimerGauge, TransferController};
