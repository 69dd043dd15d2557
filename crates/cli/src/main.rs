//! Binary entry point for the listening practice player.

mod clock;
mod pcm;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use clock::ClockPlayer;
use lingua_core::{srt, PracticeConfig, Session};
use repl::{AudioInput, Repl};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
struct Cli {
    /// Enable verbose debug and trace logs.
    #[arg(long)]
    debug: bool,

    /// JSON file with practice settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Shortest length, in seconds, a sentence can be edited down to.
    #[arg(long)]
    min_duration: Option<f64>,

    /// Number of sentences shown in the waveform window.
    #[arg(long)]
    window_segments: Option<usize>,

    /// Distance from a sentence's end within which play restarts it.
    #[arg(long)]
    replay_threshold: Option<f64>,

    /// Raw 32-bit float mono PCM used to draw the waveform.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Sample rate of `--audio`.
    #[arg(long, default_value_t = 16_000)]
    sample_rate: u32,

    /// Waveform width when stdout is not a terminal.
    #[arg(long, default_value_t = 80)]
    width: usize,

    /// Path to the SRT transcript to practice with.
    subtitles: PathBuf,
}

impl Cli {
    /// Settings from `--config`, overridden by individual flags.
    fn practice_config(&self) -> Result<PracticeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                PracticeConfig::from_json(&text)?
            }
            None => PracticeConfig::default(),
        };
        if let Some(v) = self.min_duration {
            config.min_duration = v;
        }
        if let Some(v) = self.window_segments {
            config.window_segments = v;
        }
        if let Some(v) = self.replay_threshold {
            config.replay_threshold = v;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Where edits are written: `name.srt` becomes `name_edited.srt`.
fn edited_path(input: &Path) -> PathBuf {
    input.with_file_name(format!(
        "{}_edited.srt",
        input.file_stem().unwrap_or_default().to_string_lossy()
    ))
}

/// Application entry point which parses CLI args and starts the session.
/// This function should initialize logging and delegate to the core library.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("lingua=trace".parse()?)
            .add_directive("lingua_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("lingua=info".parse()?)
            .add_directive("lingua_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.practice_config()?;
    let document = tokio::fs::read_to_string(&cli.subtitles)
        .await
        .with_context(|| format!("reading {}", cli.subtitles.display()))?;
    let mut session = Session::new(ClockPlayer::new(None), config);
    session
        .load(&document)
        .with_context(|| format!("SRT parsing failed for {}", cli.subtitles.display()))?;
    info!(
        "loaded {} sentences from {}",
        session.store().segments().len(),
        cli.subtitles.display()
    );

    let out = edited_path(&cli.subtitles);
    session.on_save(move |segments| match std::fs::write(&out, srt::encode(segments)) {
        Ok(()) => info!("wrote {}", out.display()),
        Err(err) => warn!("could not write {}: {err}", out.display()),
    });

    let audio = cli.audio.clone().map(|path| AudioInput {
        path,
        sample_rate: cli.sample_rate,
    });
    Repl::new(session, cli.width).run(audio).await
}
