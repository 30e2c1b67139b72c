//! Request builder: turns raw form input into a validated conversion request

use anyhow::{anyhow, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ValidationError;

/// Video file selected for upload
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub name: String,
    pub mime: String,
    pub source: VideoSource,
}

/// Where the upload body comes from
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// Already in memory
    Memory(Bytes),
    /// Streamed from disk at upload time
    Disk { path: PathBuf, len: u64 },
}

impl VideoFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime = guess_mime(&name).to_string();
        Self {
            name,
            mime,
            source: VideoSource::Memory(data.into()),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    /// Reference a file on disk. Only its metadata is read here.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(anyhow!("Not a regular file: {}", path.display()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        let mime = guess_mime(&name).to_string();

        Ok(Self {
            name,
            mime,
            source: VideoSource::Disk {
                path: path.to_path_buf(),
                len: metadata.len(),
            },
        })
    }

    pub fn size(&self) -> u64 {
        match &self.source {
            VideoSource::Memory(data) => data.len() as u64,
            VideoSource::Disk { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn size_mb(&self) -> f64 {
        self.size() as f64 / 1024.0 / 1024.0
    }
}

fn guess_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mpeg" | "mpg" => "video/mpeg",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Spoken language of the video, or automatic detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Auto,
    Ru,
    En,
    Es,
    Fr,
    De,
    Zh,
    Ja,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Auto,
        Language::Ru,
        Language::En,
        Language::Es,
        Language::Fr,
        Language::De,
        Language::Zh,
        Language::Ja,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Auto => "auto",
            Language::Ru => "ru",
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::Zh => "zh",
            Language::Ja => "ja",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Language::ALL
            .iter()
            .copied()
            .find(|lang| lang.code() == lower)
            .ok_or_else(|| format!("Unsupported language: {}", s))
    }
}

/// Whisper model size requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            other => Err(format!("Unknown model size: {}", other)),
        }
    }
}

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    #[default]
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SubtitleFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "vtt" => Ok(SubtitleFormat::Vtt),
            other => Err(format!("Unknown subtitle format: {}", other)),
        }
    }
}

/// Service route for the upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Transcribe,
    TranscribeWithSubtitles,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Transcribe => "/api/convert",
            Endpoint::TranscribeWithSubtitles => "/api/convert-with-subtitles",
        }
    }
}

/// Route used by the connectivity probe
pub const HEALTH_PATH: &str = "/api/test";

/// Beam size used when no other value is chosen
pub const DEFAULT_BEAM_SIZE: u32 = 5;

/// Raw user input as collected by the front end
#[derive(Debug, Clone)]
pub struct ConversionForm {
    pub file: Option<VideoFile>,
    pub language: Language,
    pub model: ModelSize,
    pub with_subtitles: bool,
    pub subtitle_format: SubtitleFormat,
    pub diarization_enabled: bool,
    pub speaker_count_hint: Option<u32>,
    pub speaker_names: Vec<String>,
    pub speed_mode: bool,
    pub beam_size: u32,
    pub translate_to_english: bool,
}

impl Default for ConversionForm {
    fn default() -> Self {
        Self {
            file: None,
            language: Language::Auto,
            model: ModelSize::Base,
            with_subtitles: false,
            subtitle_format: SubtitleFormat::Srt,
            diarization_enabled: false,
            speaker_count_hint: None,
            speaker_names: Vec::new(),
            speed_mode: false,
            beam_size: DEFAULT_BEAM_SIZE,
            translate_to_english: false,
        }
    }
}

impl ConversionForm {
    pub fn new(file: VideoFile) -> Self {
        Self {
            file: Some(file),
            ..Self::default()
        }
    }

    /// Validate the form and select the endpoint
    pub fn build(&self) -> Result<(ConversionRequest, Endpoint), ValidationError> {
        let file = self.file.clone().ok_or(ValidationError::NoFile)?;
        if file.is_empty() {
            return Err(ValidationError::EmptyFile(file.name));
        }

        let speaker_count_hint = match self.speaker_count_hint {
            Some(count) => Some(NonZeroU32::new(count).ok_or(ValidationError::InvalidSpeakerCount)?),
            None => None,
        };

        let beam_size = if self.speed_mode {
            NonZeroU32::MIN
        } else {
            NonZeroU32::new(self.beam_size).ok_or(ValidationError::InvalidBeamSize)?
        };

        let speaker_names = self
            .speaker_names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let endpoint = if self.with_subtitles {
            Endpoint::TranscribeWithSubtitles
        } else {
            Endpoint::Transcribe
        };

        let request = ConversionRequest {
            file,
            language: self.language,
            model: self.model,
            with_subtitles: self.with_subtitles,
            subtitle_format: self.subtitle_format,
            diarization_enabled: self.diarization_enabled,
            speaker_count_hint,
            speaker_names,
            beam_size,
            translate_to_english: self.translate_to_english,
        };

        Ok((request, endpoint))
    }
}

/// Validated upload request
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file: VideoFile,
    pub language: Language,
    pub model: ModelSize,
    pub with_subtitles: bool,
    pub subtitle_format: SubtitleFormat,
    pub diarization_enabled: bool,
    pub speaker_count_hint: Option<NonZeroU32>,
    pub speaker_names: Vec<String>,
    pub beam_size: NonZeroU32,
    pub translate_to_english: bool,
}

impl ConversionRequest {
    /// Text fields of the multipart body, in wire order. The file part is
    /// added separately by the transport.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("language", self.language.code().to_string()),
            ("model", self.model.as_str().to_string()),
            ("beam_size", self.beam_size.to_string()),
            ("enable_diarization", self.diarization_enabled.to_string()),
            ("translate_to_english", self.translate_to_english.to_string()),
        ];

        if let Some(count) = self.speaker_count_hint {
            fields.push(("num_speakers", count.to_string()));
        }

        if !self.speaker_names.is_empty() {
            // Vec<String> always serializes
            let names = serde_json::to_string(&self.speaker_names).unwrap_or_default();
            fields.push(("speaker_names", names));
        }

        if self.with_subtitles {
            fields.push(("include_speakers", self.diarization_enabled.to_string()));
            fields.push(("format", self.subtitle_format.extension().to_string()));
        }

        fields
    }
}
