use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::request::{Language, ModelSize, SubtitleFormat, DEFAULT_BEAM_SIZE};

/// Origin used during local development when no override is configured
pub const LOCAL_DEV_ORIGIN: &str = "http://localhost:8000";

/// Configuration for the video-to-text client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcription service location
    pub service: ServiceConfig,

    /// Upload and probe time limits
    pub transfer: TransferConfig,

    /// Default form values
    pub defaults: DefaultsConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Explicit base URL override. Relative values are resolved against `origin`.
    pub api_url: Option<String>,

    /// Running behind the same origin as the service (relative API paths)
    pub deployed: bool,

    /// Origin of the deployment, used when `deployed` is set
    pub origin: String,

    /// Service origin for local development
    pub local_origin: String,

    /// TCP connect timeout for the HTTP client (seconds)
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Upper bound on one upload including the response (seconds)
    pub upload_timeout_secs: u64,

    /// Timeout of the advisory health probe (seconds)
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub language: Language,
    pub model: ModelSize,
    pub beam_size: u32,
    pub subtitle_format: SubtitleFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for downloaded transcripts and subtitles
    pub dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Where the UI language preference is persisted
    pub preferences_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            deployed: false,
            origin: LOCAL_DEV_ORIGIN.to_string(),
            local_origin: LOCAL_DEV_ORIGIN.to_string(),
            connect_timeout_secs: 30,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            upload_timeout_secs: 600, // 10 minutes for large files
            probe_timeout_secs: 3,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            language: Language::Auto,
            model: ModelSize::Base,
            beam_size: DEFAULT_BEAM_SIZE,
            subtitle_format: SubtitleFormat::Srt,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
            log_level: "info".to_string(),
            preferences_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            transfer: TransferConfig::default(),
            defaults: DefaultsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first readable config file, then apply
    /// environment overrides. A config file that exists but does not parse
    /// is an error.
    pub fn load() -> Result<Self> {
        Self::load_first(&[
            Path::new("video-to-text.toml"),
            Path::new("config/video-to-text.toml"),
        ])
    }

    fn load_first(config_paths: &[&Path]) -> Result<Self> {
        for path in config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                let mut config: Config = toml::from_str(&config_str)
                    .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
                tracing::info!("📄 Loaded configuration from: {}", path.display());
                config.apply_env();
                return Ok(config);
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&config_str)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(api_url) = std::env::var("VIDEO_TO_TEXT_API_URL") {
            if !api_url.trim().is_empty() {
                self.service.api_url = Some(api_url);
            }
        }

        if let Ok(timeout) = std::env::var("VIDEO_TO_TEXT_UPLOAD_TIMEOUT") {
            match timeout.parse() {
                Ok(secs) => self.transfer.upload_timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid VIDEO_TO_TEXT_UPLOAD_TIMEOUT: {}", timeout),
            }
        }

        if let Ok(log_level) = std::env::var("VIDEO_TO_TEXT_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        if let Ok(output_dir) = std::env::var("VIDEO_TO_TEXT_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(output_dir);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.transfer.upload_timeout_secs == 0 {
            return Err(anyhow!("upload_timeout_secs must be greater than 0"));
        }

        if self.transfer.probe_timeout_secs == 0 {
            return Err(anyhow!("probe_timeout_secs must be greater than 0"));
        }

        if self.defaults.beam_size == 0 {
            return Err(anyhow!("beam_size must be greater than 0"));
        }

        self.resolve_base_url()?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Base URL of the service.
    ///
    /// An explicit override wins; otherwise deployed builds talk to their own
    /// origin and local builds to the development server.
    pub fn resolve_base_url(&self) -> Result<Url> {
        let origin = if self.service.deployed {
            &self.service.origin
        } else {
            &self.service.local_origin
        };
        let origin = Url::parse(origin).map_err(|e| anyhow!("Invalid origin {}: {}", origin, e))?;

        match self.service.api_url.as_deref().map(str::trim) {
            Some(api_url) if !api_url.is_empty() => match Url::parse(api_url) {
                Ok(url) => Ok(url),
                Err(url::ParseError::RelativeUrlWithoutBase) => origin
                    .join(api_url)
                    .map_err(|e| anyhow!("Invalid api_url {}: {}", api_url, e)),
                Err(e) => Err(anyhow!("Invalid api_url {}: {}", api_url, e)),
            },
            _ => Ok(origin),
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer.upload_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer.probe_timeout_secs)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.output.preferences_file.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("video-to-text")
                .join("preferences.toml")
        })
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video-to-text Configuration:\n\
            - Service: {}\n\
            - Upload Timeout: {}s\n\
            - Probe Timeout: {}s\n\
            - Default Model: {}\n\
            - Default Language: {}\n\
            - Output Directory: {}",
            self.resolve_base_url()
                .map(|u| u.to_string())
                .unwrap_or_else(|e| format!("<invalid: {}>", e)),
            self.transfer.upload_timeout_secs,
            self.transfer.probe_timeout_secs,
            self.defaults.model,
            self.defaults.language,
            self.output.dir.display(),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.config.service.api_url = Some(api_url.into());
        self
    }

    pub fn deployed_at(mut self, origin: impl Into<String>) -> Self {
        self.config.service.deployed = true;
        self.config.service.origin = origin.into();
        self
    }

    pub fn with_upload_timeout(mut self, secs: u64) -> Self {
        self.config.transfer.upload_timeout_secs = secs;
        self
    }

    pub fn with_probe_timeout(mut self, secs: u64) -> Self {
        self.config.transfer.probe_timeout_secs = secs;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.dir = dir;
        self
    }

    pub fn with_preferences_file(mut self, path: PathBuf) -> Self {
        self.config.output.preferences_file = Some(path);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
