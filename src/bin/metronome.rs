use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use metronome::audio::assets::{self, ACCENT_ASSET, TICK_ASSET};
use metronome::audio::sample::ClickSample;
use metronome::config::{AppConfig, CompletionMode};
use metronome::engine::backend::{AudioSink, CpalSink, SilentSink, SystemTimeSource};
use metronome::engine::{
    spawn_signal_listener, BeatScheduler, CancellationToken, ClickBank, SchedulerConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "metronome",
    about = "Plays a click track at a fixed tempo until interrupted"
)]
struct Cli {
    /// Tempo in beats per minute
    #[arg(long)]
    bpm: Option<u32>,
    /// Accent the first beat of every bar (bare flag means true)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    accent: Option<bool>,
    /// Beats per bar when accenting
    #[arg(long)]
    beats_per_bar: Option<u32>,
    /// How the playback duration of each beat is measured
    #[arg(long, value_enum)]
    completion: Option<CompletionArg>,
    /// Click sample to use instead of the embedded tick
    #[arg(long)]
    click: Option<PathBuf>,
    /// Accent sample to use instead of the embedded accent click
    #[arg(long)]
    accent_click: Option<PathBuf>,
    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Simulate playback timing without opening an audio device
    #[arg(long)]
    dry_run: bool,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionArg {
    Optimistic,
    Await,
}

impl From<CompletionArg> for CompletionMode {
    fn from(value: CompletionArg) -> Self {
        match value {
            CompletionArg::Optimistic => CompletionMode::Optimistic,
            CompletionArg::Await => CompletionMode::Await,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    metronome::init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    config.validate().context("invalid configuration")?;

    let scheduler_config =
        SchedulerConfig::from_config(&config.metronome).context("invalid configuration")?;

    let normal = load_click(cli.click.as_deref(), TICK_ASSET)?;
    let clicks = if config.metronome.accent {
        let accent = load_click(cli.accent_click.as_deref(), ACCENT_ASSET)?;
        ClickBank::new(&normal, &accent).context("preparing accent click")?
    } else {
        if let Some(path) = ignored_accent_click(&cli, &config) {
            tracing::warn!(
                "Ignoring --accent-click {}: accents are off (pass --accent)",
                path.display()
            );
        }
        ClickBank::single(&normal)
    };

    let format = clicks.format();
    let sink: Box<dyn AudioSink> = if cli.dry_run {
        tracing::info!("Dry run: simulating playback without an audio device");
        Box::new(
            SilentSink::new(format, config.audio.session_queue_capacity)
                .context("starting silent sink")?,
        )
    } else {
        Box::new(CpalSink::open(format, &config.audio).context("opening audio output")?)
    };

    let cancel = CancellationToken::new();
    // Detached: the listener thread lives until a signal or process exit.
    let _listener = spawn_signal_listener(cancel.clone())?;

    let mut scheduler = BeatScheduler::new(
        scheduler_config,
        clicks,
        sink,
        Arc::new(SystemTimeSource::default()),
        cancel,
    )
    .context("creating beat scheduler")?;

    let summary = scheduler.run().context("beat loop aborted")?;
    tracing::info!(
        "Played {} beats in {:.3}s ({} skipped, {} overruns)",
        summary.beats - summary.skipped,
        summary.elapsed.as_secs_f64(),
        summary.skipped,
        summary.overruns
    );
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(bpm) = cli.bpm {
        config.metronome.bpm = bpm;
    }
    if let Some(accent) = cli.accent {
        config.metronome.accent = accent;
    }
    if let Some(beats_per_bar) = cli.beats_per_bar {
        config.metronome.beats_per_bar = beats_per_bar;
    }
    if let Some(mode) = cli.completion {
        config.metronome.completion_mode = mode.into();
    }
    Ok(config)
}

/// `--accent-click` given while accents are off.
fn ignored_accent_click<'a>(cli: &'a Cli, config: &AppConfig) -> Option<&'a Path> {
    if config.metronome.accent {
        None
    } else {
        cli.accent_click.as_deref()
    }
}

fn load_click(path: Option<&Path>, embedded: &str) -> Result<ClickSample> {
    match path {
        Some(path) => {
            assets::load_file(path).with_context(|| format!("loading click sample {}", path.display()))
        }
        None => assets::load_embedded(embedded)
            .with_context(|| format!("loading embedded asset {embedded}")),
    }
}
