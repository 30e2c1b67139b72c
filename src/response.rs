//! Response interpreter
//!
//! Validates raw service payloads on ingress. Everything downstream works with
//! [`ConversionSuccess`] and never sees loosely-typed JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::ConversionFailure;
use crate::request::SubtitleFormat;

/// Message used when an error body carries no usable detail
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Transcribed segment with timing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub id: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
    #[serde(default, rename = "speaker", skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// Validated successful conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSuccess {
    pub text: String,
    pub segments: Vec<Segment>,
    pub subtitles: Option<String>,
    pub subtitle_format: Option<SubtitleFormat>,
    pub detected_language: Option<String>,
    pub speaker_texts: Option<BTreeMap<String, String>>,
    pub speaker_count: Option<u32>,
}

/// Result of one conversion attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConversionOutcome {
    Success(ConversionSuccess),
    Failure(ConversionFailure),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&ConversionSuccess> {
        match self {
            ConversionOutcome::Success(success) => Some(success),
            ConversionOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ConversionFailure> {
        match self {
            ConversionOutcome::Success(_) => None,
            ConversionOutcome::Failure(failure) => Some(failure),
        }
    }
}

impl From<ConversionFailure> for ConversionOutcome {
    fn from(failure: ConversionFailure) -> Self {
        ConversionOutcome::Failure(failure)
    }
}

/// Field counts logged for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSummary {
    pub text_chars: usize,
    pub segment_count: usize,
}

#[derive(Debug, Deserialize)]
struct RawSuccessPayload {
    #[serde(default)]
    success: Option<bool>,
    text: Option<String>,
    #[serde(default)]
    segments: Option<Vec<Segment>>,
    #[serde(default)]
    subtitles: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    speakers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    num_speakers: Option<u32>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawErrorPayload {
    detail: Option<serde_json::Value>,
}

/// Interpret a 2xx response body
pub fn interpret_success(body: &[u8]) -> Result<ConversionSuccess, ConversionFailure> {
    let raw: RawSuccessPayload = serde_json::from_slice(body).map_err(|e| {
        debug!("Unparseable success body: {}", e);
        ConversionFailure::service(format!("Invalid response from server: {}", e))
    })?;

    if raw.success == Some(false) {
        let message = raw
            .detail
            .as_ref()
            .and_then(render_detail)
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        return Err(ConversionFailure::service(message));
    }

    let text = raw
        .text
        .ok_or_else(|| ConversionFailure::service("Invalid response from server: missing text"))?;

    let subtitle_format = match (&raw.subtitles, raw.format.as_deref()) {
        (_, Some(format)) => Some(format.parse::<SubtitleFormat>().map_err(|e| {
            ConversionFailure::service(format!("Invalid response from server: {}", e))
        })?),
        (Some(_), None) => Some(SubtitleFormat::Srt),
        (None, None) => None,
    };

    let segments = raw.segments.unwrap_or_default();

    let speaker_texts = match raw.speakers {
        Some(map) => Some(map),
        None => speaker_texts_from_segments(&segments),
    };

    let speaker_count = raw
        .num_speakers
        .filter(|n| *n > 0)
        .or_else(|| distinct_speakers(&segments))
        .or_else(|| {
            speaker_texts
                .as_ref()
                .map(|m| m.len() as u32)
                .filter(|n| *n > 0)
        });

    let success = ConversionSuccess {
        text,
        segments,
        subtitles: raw.subtitles,
        subtitle_format,
        detected_language: raw.language,
        speaker_texts,
        speaker_count,
    };

    let summary = success.summary();
    info!(
        "📝 Response received: {} characters, {} segments",
        summary.text_chars, summary.segment_count
    );

    Ok(success)
}

/// Resolve the user-facing message of a non-2xx response body
pub fn interpret_error_body(body: &[u8]) -> String {
    serde_json::from_slice::<RawErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.detail)
        .as_ref()
        .and_then(render_detail)
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

fn render_detail(detail: &serde_json::Value) -> Option<String> {
    match detail {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn distinct_speakers(segments: &[Segment]) -> Option<u32> {
    let mut labels: Vec<&str> = segments.iter().filter_map(|s| s.speaker.as_deref()).collect();
    labels.sort_unstable();
    labels.dedup();
    if labels.is_empty() {
        None
    } else {
        Some(labels.len() as u32)
    }
}

fn speaker_texts_from_segments(segments: &[Segment]) -> Option<BTreeMap<String, String>> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for segment in segments {
        if let Some(label) = &segment.speaker {
            let entry = map.entry(label.clone()).or_default();
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(segment.text.trim());
        }
    }
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

impl ConversionSuccess {
    pub fn summary(&self) -> PayloadSummary {
        PayloadSummary {
            text_chars: self.text.chars().count(),
            segment_count: self.segments.len(),
        }
    }

    pub fn has_speakers(&self) -> bool {
        self.speaker_count.map_or(false, |n| n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_minimal_payload() {
        let success = interpret_success(&body(json!({"success": true, "text": "hello"}))).unwrap();
        assert_eq!(success.text, "hello");
        assert!(success.segments.is_empty());
        assert_eq!(success.subtitles, None);
        assert_eq!(success.subtitle_format, None);
        assert_eq!(success.speaker_count, None);
        assert_eq!(success.speaker_texts, None);
    }

    #[test]
    fn test_missing_text_is_service_error() {
        let failure = interpret_success(&body(json!({"success": true}))).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ServiceError);
    }

    #[test]
    fn test_success_false_uses_detail() {
        let failure =
            interpret_success(&body(json!({"success": false, "detail": "busy"}))).unwrap_err();
        assert_eq!(failure.message, "busy");
    }

    #[test]
    fn test_invalid_json_is_service_error() {
        let failure = interpret_success(b"<html>gateway</html>").unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ServiceError);
    }

    #[test]
    fn test_segments_with_speakers() {
        let payload = body(json!({
            "success": true,
            "text": "hi there",
            "segments": [
                {"id": 1, "start": 0, "end": 2.5, "text": "hi", "speaker": "A"},
                {"id": 2, "start": 2.5, "end": 4.0, "text": "there", "speaker": "B"},
                {"id": 3, "start": 4.0, "end": 5.0, "text": "again", "speaker": "A"}
            ]
        }));
        let success = interpret_success(&payload).unwrap();

        assert_eq!(success.segments.len(), 3);
        assert_eq!(success.segments[0].id, 1);
        assert_eq!(success.segments[0].start, 0.0);
        assert_eq!(success.segments[0].end, 2.5);
        assert_eq!(success.segments[0].text, "hi");
        assert_eq!(success.segments[0].speaker.as_deref(), Some("A"));
        assert_eq!(success.speaker_count, Some(2));

        let texts = success.speaker_texts.unwrap();
        assert_eq!(texts["A"], "hi again");
        assert_eq!(texts["B"], "there");
    }

    #[test]
    fn test_explicit_speaker_data_wins() {
        let payload = body(json!({
            "success": true,
            "text": "x",
            "segments": [{"id": 0, "start": 0.0, "end": 1.0, "text": "x", "speaker": "S1"}],
            "speakers": {"SPEAKER_00": "full text"},
            "num_speakers": 3
        }));
        let success = interpret_success(&payload).unwrap();
        assert_eq!(success.speaker_count, Some(3));
        assert_eq!(success.speaker_texts.unwrap()["SPEAKER_00"], "full text");
    }

    #[test]
    fn test_subtitle_format_normalization() {
        let vtt = interpret_success(&body(json!({
            "success": true, "text": "a", "subtitles": "WEBVTT", "format": "VTT"
        })))
        .unwrap();
        assert_eq!(vtt.subtitle_format, Some(SubtitleFormat::Vtt));

        let defaulted = interpret_success(&body(json!({
            "success": true, "text": "a", "subtitles": "1"
        })))
        .unwrap();
        assert_eq!(defaulted.subtitle_format, Some(SubtitleFormat::Srt));

        let unknown = interpret_success(&body(json!({
            "success": true, "text": "a", "subtitles": "1", "format": "ass"
        })));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_error_body_detail() {
        assert_eq!(interpret_error_body(br#"{"detail":"model load failed"}"#), "model load failed");
        assert_eq!(interpret_error_body(b"Internal Server Error"), UNKNOWN_ERROR);
        assert_eq!(interpret_error_body(br#"{"error":"x"}"#), UNKNOWN_ERROR);
        assert_eq!(
            interpret_error_body(br#"{"detail":[{"loc":["file"]}]}"#),
            r#"[{"loc":["file"]}]"#
        );
    }

    #[test]
    fn test_summary_counts() {
        let success = interpret_success(&body(json!({
            "success": true,
            "text": "привет",
            "segments": [{"id": 0, "start": 0.0, "end": 1.0, "text": "привет"}]
        })))
        .unwrap();
        assert_eq!(
            success.summary(),
            PayloadSummary { text_chars: 6, segment_count: 1 }
        );
        assert!(!success.has_speakers());
    }

    #[test]
    fn test_speaker_count_from_speaker_map() {
        let success = interpret_success(&body(json!({
            "success": true,
            "text": "a b",
            "speakers": {"SPEAKER_00": "a", "SPEAKER_01": "b"}
        })))
        .unwrap();
        assert_eq!(success.speaker_count, Some(2));
        assert!(success.has_speakers());
    }

    #[test]
    fn test_empty_body_is_unknown_error() {
        assert_eq!(interpret_error_body(b""), UNKNOWN_ERROR);
    }
}
