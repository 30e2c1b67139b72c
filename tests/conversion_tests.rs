use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use video_to_text::artifacts;
use video_to_text::{
    ConversionForm, ConversionOrchestrator, ErrorKind, HttpTranscriptionService, Language,
    SubtitleFormat, TransferState, ValidationError, VideoFile,
};

fn orchestrator(server: &MockServer) -> ConversionOrchestrator<HttpTranscriptionService> {
    let base = Url::parse(&server.uri()).unwrap();
    let service = HttpTranscriptionService::new(base).unwrap();
    ConversionOrchestrator::new(Arc::new(service))
}

fn form() -> ConversionForm {
    ConversionForm::new(VideoFile::new("clip.mp4", b"fake video bytes".to_vec()))
}

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "API is working"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_missing_file_never_reaches_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let result = orchestrator.submit(&ConversionForm::default());

    assert!(matches!(result, Err(ValidationError::NoFile)));
    assert_eq!(orchestrator.state(), TransferState::Idle);
}

#[tokio::test]
async fn test_subtitles_end_to_end() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert-with-subtitles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "text": "hello world",
            "subtitles": "1\n00:00:00,000 --> 00:00:01,000\nhello world\n",
            "format": "srt",
            "language": "en"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let mut form = form();
    form.with_subtitles = true;
    form.language = Language::En;

    let report = orchestrator.submit(&form).unwrap().await;
    assert!(report.applied);

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, TransferState::Succeeded);
    assert!(snapshot.probe.unwrap().is_reachable());

    let success = report.outcome.success().unwrap();
    assert_eq!(success.text, "hello world");
    assert_eq!(success.subtitle_format, Some(SubtitleFormat::Srt));
    assert_eq!(success.detected_language.as_deref(), Some("en"));
    assert_eq!(
        success.subtitles.as_deref(),
        Some("1\n00:00:00,000 --> 00:00:01,000\nhello world\n")
    );
}

#[tokio::test]
async fn test_multipart_carries_form_fields() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .and(body_string_contains("name=\"file\"; filename=\"clip.mp4\""))
        .and(body_string_contains("fake video bytes"))
        .and(body_string_contains("name=\"beam_size\"\r\n\r\n1"))
        .and(body_string_contains("name=\"enable_diarization\"\r\n\r\ntrue"))
        .and(body_string_contains("name=\"num_speakers\"\r\n\r\n2"))
        .and(body_string_contains(r#"["Anna","Boris"]"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "text": "ok"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let mut form = form();
    form.speed_mode = true;
    form.diarization_enabled = true;
    form.speaker_count_hint = Some(2);
    form.speaker_names = vec!["Anna".into(), " ".into(), "Boris".into()];

    let report = orchestrator.submit(&form).unwrap().await;
    assert!(report.outcome.is_success());
}

#[tokio::test]
async fn test_service_error_detail_is_surfaced() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "detail": "model load failed" })),
        )
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let report = orchestrator.submit(&form()).unwrap().await;

    let failure = report.outcome.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::ServiceError);
    assert_eq!(failure.message, "model load failed");
    assert_eq!(failure.probe_note, None);
    assert_eq!(orchestrator.state(), TransferState::Failed);
}

#[tokio::test]
async fn test_failed_probe_does_not_block_upload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/test"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "text": "still works"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let report = orchestrator.submit(&form()).unwrap().await;

    assert_eq!(report.outcome.success().unwrap().text, "still works");
    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.state, TransferState::Succeeded);
    assert_eq!(
        snapshot.probe.unwrap().diagnostic().as_deref(),
        Some("health check returned HTTP 500")
    );
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "success": true, "text": "late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let orchestrator =
        orchestrator(&server).with_upload_timeout(Duration::from_millis(200));
    let report = orchestrator.submit(&form()).unwrap().await;

    assert_eq!(report.outcome.failure().unwrap().kind, ErrorKind::Timeout);
    assert_eq!(orchestrator.state(), TransferState::Failed);
    assert_eq!(orchestrator.snapshot().progress, None);
    assert_eq!(orchestrator.timer_gauge().active(), 0);
}

#[tokio::test]
async fn test_newer_submission_supersedes_slow_one() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "success": true, "text": "first" }))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "text": "second"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let first = orchestrator.submit(&form()).unwrap();
    let second = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        orchestrator.submit(&form()).unwrap().await
    };

    let (first, second) = tokio::join!(first, second);

    assert!(!first.applied);
    assert_eq!(
        first.outcome.failure().unwrap().kind,
        ErrorKind::AbortedBySupersession
    );
    assert!(second.applied);

    let snapshot = orchestrator.snapshot();
    assert_eq!(snapshot.attempt, Some(second.attempt));
    assert_eq!(snapshot.outcome.unwrap().success().unwrap().text, "second");
    assert_eq!(orchestrator.timer_gauge().active(), 0);
}

#[tokio::test]
async fn test_speaker_segments_and_artifacts() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert-with-subtitles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "text": "Hi there. Hello.",
            "language": "en",
            "subtitles": "WEBVTT\n\n00:00.000 --> 00:01.500\nHi there.\n",
            "format": "vtt",
            "segments": [
                { "id": 0, "start": 0.0, "end": 1.5, "text": "Hi there.", "speaker": "SPEAKER_00" },
                { "id": 1, "start": 1.5, "end": 2.75, "text": "Hello.", "speaker": "SPEAKER_01" }
            ]
        })))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let mut form = form();
    form.with_subtitles = true;
    form.subtitle_format = SubtitleFormat::Vtt;
    form.diarization_enabled = true;

    let report = orchestrator.submit(&form).unwrap().await;
    let success = report.outcome.success().unwrap();

    assert_eq!(success.speaker_count, Some(2));
    let speakers = success.speaker_texts.as_ref().unwrap();
    assert_eq!(speakers["SPEAKER_00"], "Hi there.");
    assert_eq!(speakers["SPEAKER_01"], "Hello.");

    let rendered = artifacts::render_summary(success, video_to_text::UiLanguage::En.messages());
    assert!(rendered.contains("[00:01.500 - 00:02.750] SPEAKER_01: Hello."));

    let dir = TempDir::new().unwrap();
    let text_path = artifacts::write_text(dir.path(), success).await.unwrap();
    assert_eq!(std::fs::read_to_string(text_path).unwrap(), "Hi there. Hello.");
    let subtitles_path = artifacts::write_subtitles(dir.path(), success)
        .await
        .unwrap()
        .unwrap();
    assert!(subtitles_path.ends_with("subtitles.vtt"));
}

#[tokio::test]
async fn test_file_on_disk_is_streamed() {
    let dir = TempDir::new().unwrap();
    let video_path = dir.path().join("lecture.webm");
    tokio::fs::write(&video_path, b"webm bytes from disk").await.unwrap();

    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/convert"))
        .and(body_string_contains("filename=\"lecture.webm\"\r\nContent-Type: video/webm"))
        .and(body_string_contains("webm bytes from disk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "text": "from disk"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = VideoFile::from_path(&video_path).await.unwrap();
    let orchestrator = orchestrator(&server);
    let report = orchestrator.submit(&ConversionForm::new(file)).unwrap().await;

    assert!(report.applied);
    assert_eq!(report.outcome.success().unwrap().text, "from disk");
}
