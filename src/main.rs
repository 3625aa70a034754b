//! Voice note recorder and transcriber CLI

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

use whisper_sync::{
    wav, CaptureSummary, Config, MicrophoneInput, Player, Recorder, SessionListener, Transcriber,
    TranscriptionEvent, WhisperLoader, MAX_AMPLITUDE,
};

/// Redraw rate of the live level bar
const METER_INTERVAL: Duration = Duration::from_millis(33);
const METER_WIDTH: usize = 40;

/// Voice note recorder with offline transcription
#[derive(Parser)]
#[command(name = "whisper-sync")]
#[command(about = "Record voice notes and transcribe them with Whisper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Record from the microphone until Enter or Ctrl+C
    Record {
        /// Output WAV file path (replaces the previous recording)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Audio input device name
        #[arg(short = 'D', long)]
        device: Option<String>,
    },

    /// Play the last recording
    Play {
        /// WAV file path
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Transcribe the last recording
    Transcribe {
        /// WAV file path
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Path to Whisper model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Language code (e.g., en, de, fr)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// List available audio input devices
    Devices,

    /// Print the header fields of a WAV file
    Info {
        /// WAV file path
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

/// Prints session events that the terminal cannot otherwise show
struct ConsoleListener;

impl SessionListener for ConsoleListener {
    fn on_capture_finished(&self, summary: &CaptureSummary) {
        if let Some(ref error) = summary.error {
            eprintln!("\nRecording ended early: {}", error);
        }
    }

    fn on_transcription(&self, event: &TranscriptionEvent) {
        match event {
            TranscriptionEvent::Started => eprintln!("Transcribing..."),
            TranscriptionEvent::Completed(text) => debug!("Transcript: {} chars", text.len()),
            TranscriptionEvent::Failed(message) => debug!("Transcription failed: {}", message),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging - quiet by default, use -v for more
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    // Load configuration
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Record { output, device } => {
            if let Some(output) = output {
                config.storage.recording_path = output;
            }
            if let Some(device) = device {
                config.audio.device = Some(device);
            }
            record(config)
        }
        Commands::Play { input } => {
            if let Some(input) = input {
                config.storage.recording_path = input;
            }
            play(config)
        }
        Commands::Transcribe {
            input,
            model,
            language,
        } => {
            if let Some(input) = input {
                config.storage.recording_path = input;
            }
            if let Some(model) = model {
                config.stt.model_path = Some(model);
            }
            if let Some(language) = language {
                config.stt.language = language;
            }
            transcribe(config)
        }
        Commands::Devices => list_devices(),
        Commands::Info { input } => {
            if let Some(input) = input {
                config.storage.recording_path = input;
            }
            show_info(config)
        }
    }
}

/// Capture until Enter or Ctrl+C while drawing the live level
fn record(config: Config) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    // Enter also stops; the reader thread is left blocked on stdin otherwise
    let r = running.clone();
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        r.store(false, Ordering::SeqCst);
    });

    let path = config.storage.recording_path.clone();
    let mut recorder = Recorder::new(
        MicrophoneInput::new(),
        config.audio.clone(),
        &path,
        Arc::new(ConsoleListener),
    );
    recorder.start().context("Failed to start recording")?;

    println!("Recording to {} ... press Enter or Ctrl+C to stop", path.display());

    let started = Instant::now();
    while running.load(Ordering::SeqCst) && recorder.is_capturing() {
        print!(
            "\r{} {:5.1}s",
            level_bar(recorder.amplitude()),
            started.elapsed().as_secs_f32()
        );
        let _ = io::stdout().flush();
        thread::sleep(METER_INTERVAL);
    }
    println!();

    let summary = recorder
        .stop_and_wait()
        .context("Failed to finalize recording")?;

    if let Some(summary) = summary {
        let seconds = summary.samples() as f32 / config.audio.sample_rate as f32;
        println!(
            "Saved {} ({} bytes, {:.1}s)",
            summary.path.display(),
            summary.file_len(),
            seconds
        );
    }

    Ok(())
}

fn level_bar(level: u16) -> String {
    let filled = (level as usize * METER_WIDTH) / MAX_AMPLITUDE as usize;
    let filled = filled.min(METER_WIDTH);
    format!("[{}{}]", "#".repeat(filled), " ".repeat(METER_WIDTH - filled))
}

fn play(config: Config) -> Result<()> {
    let path = &config.storage.recording_path;
    let mut player = Player::new();

    if !player.play(path).context("Failed to start playback")? {
        println!("Nothing to play: {}", path.display());
        return Ok(());
    }

    println!("Playing {}", path.display());
    player.wait();
    player.stop();
    Ok(())
}

fn transcribe(config: Config) -> Result<()> {
    let path = config.storage.recording_path.clone();
    let loader = Arc::new(WhisperLoader::new(config.stt.clone()));
    let transcriber = Transcriber::new(config.stt, loader, Arc::new(ConsoleListener));

    match transcriber.transcribe_file(&path) {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e).context("Transcription failed")
        }
    }
}

/// List available audio input devices
fn list_devices() -> Result<()> {
    let input = MicrophoneInput::new();
    let devices = input.list_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found");
    } else {
        println!("Available audio input devices:");
        for (i, name) in devices.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }

    Ok(())
}

fn show_info(config: Config) -> Result<()> {
    let path = &config.storage.recording_path;
    let data = wav::read_file(path)
        .with_context(|| format!("Failed to read WAV file {}", path.display()))?;

    println!("File:            {}", path.display());
    println!("Sample rate:     {} Hz", data.spec.sample_rate);
    println!("Channels:        {}", data.spec.channels);
    println!("Bits per sample: {}", data.spec.bits_per_sample);
    println!("Samples:         {}", data.samples.len());
    println!("Duration:        {:.2}s", data.duration());

    Ok(())
}
