// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use soundpad::audio;
use soundpad::chord::{canonical_chord, CaptureHandle, ChordDetector, StdinCapture};
use soundpad::config::{self, Board};
use soundpad::controller::{
    display_name, Controller, LoggingDeviceManager, ShutdownSequence, SoundBoard,
};
use soundpad::samples::{EngineConfig, MixingEngine, SampleStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long the controller gets to drain its queue on shutdown.
const CONTROLLER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// How often `play` checks whether the sound has finished.
const PLAYBACK_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A hotkey-driven soundboard."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Start will load a board and trigger its sounds from key chords.
    Start {
        /// The path to the board config.
        board_path: String,
    },
    /// Plays a single sound file through the audio interface.
    Play {
        /// The path to the sound file.
        file: String,
        /// The device name to play through.
        #[arg(short, long, default_value = "default")]
        device: String,
        /// The playback volume, from 0.0 to 2.0.
        #[arg(short, long, default_value_t = 1.0)]
        volume: f32,
    },
    /// Prints the canonical form of one or more key chords.
    Chord {
        /// Chords such as "Ctrl+Shift+1".
        #[arg(required = true)]
        chords: Vec<String>,
    },
    /// Lists the playable sound files in a directory.
    Scan {
        /// The directory to scan.
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { board_path } => start(Path::new(&board_path)).await?,
        Commands::Play {
            file,
            device,
            volume,
        } => play(PathBuf::from(file), &device, volume).await?,
        Commands::Chord { chords } => {
            for chord in chords {
                match canonical_chord(&chord) {
                    Some(canonical) => println!("{} -> {}", chord, canonical),
                    None => println!("{} -> (empty)", chord),
                }
            }
        }
        Commands::Scan { path } => {
            let sounds = config::scan_sounds(Path::new(&path))?;

            if sounds.is_empty() {
                println!("No sounds found in {}.", path);
                return Ok(());
            }

            println!("Sounds (count: {}):", sounds.len());
            for sound in sounds {
                println!("- {} ({})", display_name(&sound), sound.display());
            }
        }
    }

    Ok(())
}

async fn start(board_path: &Path) -> Result<(), Box<dyn Error>> {
    let board_config = Board::deserialize(board_path)?;
    let audio_config = board_config.audio();
    let engine_config = audio_config.engine_config();
    let capture_timeout = board_config.capture_shutdown_timeout()?;

    let store = Arc::new(SampleStore::new(engine_config.sample_rate));
    let engine = Arc::new(MixingEngine::new(engine_config));
    let (detector, events) = ChordDetector::new(board_config.event_queue_size());
    let detector = Arc::new(detector);

    let board = Arc::new(SoundBoard::new(
        store,
        engine.clone(),
        detector.clone(),
        Arc::new(LoggingDeviceManager),
        board_config.slots(),
        board_config.settings(),
    ));
    let hotkeys = board.register_hotkeys();
    let loaded = board.preload();
    info!(
        slots = board.slots().len(),
        hotkeys, loaded, "Sound board ready"
    );

    let sink = audio::get_sink(audio_config.device());
    let stream = sink.open(&engine_config, engine.callback())?;
    info!(device = %sink, "Output stream open");

    let capture = CaptureHandle::spawn(StdinCapture, detector)?;
    let mut controller = Controller::spawn(board.clone(), events);

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt, shutting down");

    let report = ShutdownSequence::new()
        .step("stop voices", || {
            board.stop_all();
            Ok(())
        })
        .step("close output stream", move || Ok(stream.close()?))
        .step("stop engine", || {
            engine.shutdown();
            Ok(())
        })
        .step("stop key capture", move || {
            Ok(capture.stop(capture_timeout)?)
        })
        .step("stop controller", || {
            Ok(controller.stop(CONTROLLER_STOP_TIMEOUT)?)
        })
        .step("restore microphones", || {
            board.restore_mics();
            Ok(())
        })
        .run();

    if !report.is_clean() {
        warn!(failed = ?report.failed, "Shutdown finished with failures");
    }
    controller.join().await?;

    Ok(())
}

async fn play(file: PathBuf, device: &str, volume: f32) -> Result<(), Box<dyn Error>> {
    let engine_config = EngineConfig::default();
    let store = SampleStore::new(engine_config.sample_rate);
    let asset = tokio::task::spawn_blocking(move || store.load(file)).await??;

    let engine = Arc::new(MixingEngine::new(engine_config));
    let sink = audio::get_sink(device);
    let stream = sink.open(&engine_config, engine.callback())?;

    info!(
        path = ?asset.path(),
        device = %sink,
        duration_ms = asset.duration().as_millis(),
        "Playing sound"
    );
    engine.play(&asset, volume, true);
    while engine.is_playing() {
        tokio::time::sleep(PLAYBACK_POLL_INTERVAL).await;
    }

    stream.close()?;
    engine.shutdown();
    Ok(())
}
