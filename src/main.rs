use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use video_to_text::artifacts;
use video_to_text::{
    Config, ConnectivityProber, ConversionForm, ConversionOrchestrator, ConversionOutcome,
    HttpTranscriptionService, Language, ModelSize, Preferences, SubtitleFormat, UiLanguage,
    VideoFile,
};

fn cli() -> Command {
    Command::new("Video-to-Text")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Upload videos to a transcription service and collect text and subtitles")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .global(true),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .value_name("URL")
                .help("Transcription service base URL")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a video to text")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Video or audio file to upload")
                        .required(true),
                )
                .arg(
                    Arg::new("language")
                        .short('l')
                        .long("language")
                        .value_name("CODE")
                        .help("Spoken language (auto, ru, en, es, fr, de, zh, ja)"),
                )
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .value_name("SIZE")
                        .help("Model size (tiny, base, small, medium, large)"),
                )
                .arg(
                    Arg::new("subtitles")
                        .short('s')
                        .long("subtitles")
                        .help("Also generate subtitles")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .help("Subtitle format (srt, vtt)"),
                )
                .arg(
                    Arg::new("diarize")
                        .long("diarize")
                        .help("Detect and label speakers")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("speakers")
                        .long("speakers")
                        .value_name("NUM")
                        .help("Expected number of speakers")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("speaker-name")
                        .long("speaker-name")
                        .value_name("NAME")
                        .help("Speaker name, in order of appearance (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("speed")
                        .long("speed")
                        .help("Fast mode (beam size 1)")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("beam-size")
                        .long("beam-size")
                        .value_name("NUM")
                        .help("Beam size for decoding")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("translate")
                        .long("translate")
                        .help("Translate the result to English")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Directory for transcription.txt and subtitles"),
                ),
        )
        .subcommand(Command::new("probe").about("Check that the service is reachable"))
        .subcommand(
            Command::new("ui-language")
                .about("Show or change the interface language")
                .subcommand(
                    Command::new("set").arg(
                        Arg::new("language")
                            .value_name("LANG")
                            .help("ru or en")
                            .required(true),
                    ),
                ),
        )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let (mut config, load_error) = match matches.get_one::<String>("config") {
        Some(path) => (Config::load_from(Path::new(path))?, None),
        None => match Config::load() {
            Ok(config) => (config, None),
            Err(e) => (Config::from_env().unwrap_or_default(), Some(e)),
        },
    };
    if let Some(api_url) = matches.get_one::<String>("api-url") {
        config.service.api_url = Some(api_url.clone());
    }

    let level = if matches.get_flag("verbose") {
        "debug".to_string()
    } else {
        config.output.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("video_to_text={},warn", level))),
        )
        .init();

    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {}", e);
    }
    debug!("{}", config.summary());

    config.validate()?;

    let mut preferences = Preferences::load(config.preferences_path());

    match matches.subcommand() {
        Some(("convert", sub)) => convert(&config, &preferences, sub).await,
        Some(("probe", _)) => probe(&config).await,
        Some(("ui-language", sub)) => {
            if let Some(("set", set)) = sub.subcommand() {
                let language: UiLanguage = set
                    .get_one::<String>("language")
                    .ok_or_else(|| anyhow!("language is required"))?
                    .parse()
                    .map_err(|e: String| anyhow!(e))?;
                preferences.set_ui_language(language)?;
            }
            println!("{}", preferences.ui_language());
            Ok(())
        }
        _ => Err(anyhow!("No command given")),
    }
}

fn build_service(config: &Config) -> Result<Arc<HttpTranscriptionService>> {
    let base_url = config.resolve_base_url()?;
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.service.connect_timeout_secs))
        .build()?;
    info!("🌐 Transcription service: {}", base_url);
    Ok(Arc::new(HttpTranscriptionService::with_client(base_url, client)))
}

async fn probe(config: &Config) -> Result<()> {
    let service = build_service(config)?;
    let report = ConnectivityProber::new(service)
        .with_timeout(config.probe_timeout())
        .probe()
        .await;

    match report.diagnostic() {
        None => {
            println!("✅ Service reachable");
            Ok(())
        }
        Some(note) => Err(anyhow!("Service unreachable: {}", note)),
    }
}

fn parse_arg<T>(sub: &ArgMatches, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    match sub.get_one::<String>(name) {
        Some(value) => value.parse().map_err(|e: String| anyhow!(e)),
        None => Ok(default),
    }
}

async fn convert(config: &Config, preferences: &Preferences, sub: &ArgMatches) -> Result<()> {
    let messages = preferences.ui_language().messages();
    let path = PathBuf::from(
        sub.get_one::<String>("file")
            .ok_or_else(|| anyhow!("file is required"))?,
    );
    let output_dir = sub
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output.dir.clone());

    let file = VideoFile::from_path(&path)
        .await
        .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;

    let form = ConversionForm {
        file: Some(file),
        language: parse_arg::<Language>(sub, "language", config.defaults.language)?,
        model: parse_arg::<ModelSize>(sub, "model", config.defaults.model)?,
        with_subtitles: sub.get_flag("subtitles"),
        subtitle_format: parse_arg::<SubtitleFormat>(sub, "format", config.defaults.subtitle_format)?,
        diarization_enabled: sub.get_flag("diarize"),
        speaker_count_hint: sub.get_one::<u32>("speakers").copied(),
        speaker_names: sub
            .get_many::<String>("speaker-name")
            .map(|names| names.cloned().collect())
            .unwrap_or_default(),
        speed_mode: sub.get_flag("speed"),
        beam_size: sub
            .get_one::<u32>("beam-size")
            .copied()
            .unwrap_or(config.defaults.beam_size),
        translate_to_english: sub.get_flag("translate"),
    };

    let service = build_service(config)?;
    let orchestrator = ConversionOrchestrator::from_config(service, config);

    let mut changes = orchestrator.subscribe_changes();
    let progress = tokio::spawn(async move {
        while let Ok(change) = changes.recv().await {
            if let Some(message) = change.progress {
                println!("⏳ {}", message.text(messages));
            }
            if change.state.is_terminal() {
                break;
            }
        }
    });

    let attempt = match orchestrator.submit(&form) {
        Ok(attempt) => attempt,
        Err(e) => {
            progress.abort();
            error!("{}: {}", messages.error_heading, e);
            return Err(e.into());
        }
    };
    let report = attempt.await;
    let _ = progress.await;

    match report.outcome {
        ConversionOutcome::Success(success) => {
            println!("{}", artifacts::render_summary(&success, messages));

            let text_path = artifacts::write_text(&output_dir, &success).await?;
            println!("💾 {}: {}", messages.saved_to, text_path.display());
            if let Some(subtitles_path) = artifacts::write_subtitles(&output_dir, &success).await? {
                println!("💾 {}: {}", messages.saved_to, subtitles_path.display());
            }

            info!(
                "🎉 Completed in {:.2}s (started {})",
                report.elapsed.as_secs_f64(),
                report.started_at.to_rfc3339()
            );
            Ok(())
        }
        ConversionOutcome::Failure(failure) => {
            let text = messages.failure_text(failure.kind, &failure.message);
            eprintln!("❌ {}: {}", messages.error_heading, text);
            if let Some(note) = &failure.probe_note {
                warn!("Connectivity probe: {}", note);
                eprintln!("   ({})", note);
            }
            Err(anyhow!("{}", failure.kind))
        }
    }
}
