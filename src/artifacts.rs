//! Download artifacts and result rendering for the front end
//!
//! Text and subtitles are written exactly as the service returned them.

use anyhow::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::locale::Messages;
use crate::request::SubtitleFormat;
use crate::response::ConversionSuccess;

pub const TEXT_FILE_NAME: &str = "transcription.txt";

/// Save the transcription text
pub async fn write_text(output_dir: &Path, success: &ConversionSuccess) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let text_path = output_dir.join(TEXT_FILE_NAME);
    tokio::fs::write(&text_path, &success.text).await?;

    info!(
        "💾 Text file saved: {} ({} characters)",
        text_path.display(),
        success.text.chars().count()
    );

    Ok(text_path)
}

/// Save the subtitles, if the service produced any
pub async fn write_subtitles(
    output_dir: &Path,
    success: &ConversionSuccess,
) -> Result<Option<PathBuf>> {
    let Some(subtitles) = &success.subtitles else {
        return Ok(None);
    };

    let format = success.subtitle_format.unwrap_or(SubtitleFormat::Srt);
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!("subtitles.{}", format.extension()));
    tokio::fs::write(&path, subtitles).await?;

    info!("💾 Subtitle file saved: {}", path.display());
    Ok(Some(path))
}

/// Human-readable result block
pub fn render_summary(success: &ConversionSuccess, messages: &Messages) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== {} ===", messages.result);
    if let Some(language) = &success.detected_language {
        let _ = writeln!(out, "{}: {}", messages.language_label, language.to_uppercase());
    }
    if let Some(count) = success.speaker_count.filter(|n| *n > 0) {
        let _ = writeln!(out, "{}: {}", messages.speakers, count);
    }

    let _ = writeln!(out, "\n{}:\n{}", messages.text, success.text.trim());

    if let Some(speakers) = success.speaker_texts.as_ref().filter(|m| !m.is_empty()) {
        let _ = writeln!(out, "\n{}:", messages.speakers);
        for (label, text) in speakers {
            let _ = writeln!(out, "  {}: {}", label, text.trim());
        }
    }

    if success.speaker_count.is_some() && !success.segments.is_empty() {
        let _ = writeln!(out, "\n{}:", messages.segments);
        for segment in &success.segments {
            let speaker = segment
                .speaker
                .as_deref()
                .map(|s| format!("{}: ", s))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  [{} - {}] {}{}",
                format_timestamp(segment.start),
                format_timestamp(segment.end),
                speaker,
                segment.text.trim()
            );
        }
    }

    out
}

/// `mm:ss.mmm`, with hours prepended once they are needed
fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
    } else {
        format!("{:02}:{:02}.{:03}", minutes, secs, millis)
    }
}
