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
mod assistant;
mod audio;
mod config;
mod input;
mod playback;
mod playsync;
mod resolver;
#[cfg(test)]
mod testutil;
mod util;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::assistant::Assistant;
use crate::audio::Device;
use crate::config::{App, DurationMode, FileStore, Profile};
use crate::input::{CombinationBuilder, KeyCombination, StaticFocus};
use crate::playback::PlaybackEngine;
use crate::util::duration_minutes_seconds;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays audio cues from key combinations to your headphones and a virtual microphone."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads and validates a config, then prints the current profile's bindings.
    Check {
        /// The path to the config.
        config_path: String,
    },
    /// Plays the binding a combination resolves to and waits for it to finish.
    Play {
        /// The path to the config.
        config_path: String,
        /// The combination to trigger, e.g. Ctrl+V.
        combination: String,
        /// Fade the clip out after this long, e.g. 3s.
        #[arg(short = 'd', long)]
        hold: Option<String>,
    },
    /// Listens for key combinations until interrupted.
    Start {
        /// The path to the config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
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
        Commands::Check { config_path } => {
            let app = App::deserialize(&PathBuf::from(&config_path))?;
            let profile = active_profile(&app)?;

            println!(
                "Profile {} (listening: {:?}, {} profile(s) total)",
                profile.name(),
                app.listening_mode(),
                app.profiles().len()
            );
            for binding in profile.bindings() {
                let clip = binding.clip();
                let duration = match clip.duration_mode()? {
                    DurationMode::PlayUntilEnd => "until end".to_string(),
                    DurationMode::FixedDuration(duration) => duration_minutes_seconds(duration),
                };
                println!(
                    "- {} ({:?}): {} [volume {:.2}, {}, {:?}{}]",
                    binding.keys(),
                    binding.mode(),
                    clip.file().display(),
                    clip.volume(),
                    duration,
                    clip.repeat(),
                    if clip.interruptible() {
                        ""
                    } else {
                        ", not interruptible"
                    },
                );
                if !clip.file().is_file() {
                    println!("  missing clip file!");
                }
            }
        }
        Commands::Play {
            config_path,
            combination,
            hold,
        } => {
            let app = App::deserialize(&PathBuf::from(&config_path))?;
            let profile = active_profile(&app)?;
            let combination: KeyCombination = combination.parse()?;
            let hold: Option<Duration> = match hold {
                Some(hold) => Some(DurationString::from_string(hold)?.into()),
                None => None,
            };

            let binding = resolver::resolve(&combination, profile.bindings())
                .ok_or_else(|| format!("no binding matches {}", combination))?;
            let engine = PlaybackEngine::new(open_devices(&app)?, Handle::current());
            engine.start(&combination, binding.clip())?;

            let key = combination.to_string();
            if let Some(hold) = hold {
                tokio::time::sleep(hold).await;
                engine.stop(&key, false);
            }

            let mut playing = engine.subscribe_playing();
            while engine.is_playing(&key) {
                if playing.changed().await.is_err() {
                    break;
                }
            }
            engine.shutdown().await;
        }
        Commands::Start { config_path } => {
            let path = PathBuf::from(&config_path);
            let store = Arc::new(FileStore::load(&path)?);
            let app = store.app();
            let profile = active_profile(&app)?;

            let engine = PlaybackEngine::new(open_devices(&app)?, Handle::current());
            let builder = CombinationBuilder::new(
                app.global().toggle().clone(),
                app.global().listener_enabled(),
                app.listening_mode(),
                // No window focus detection on this platform; the target always counts as focused.
                Arc::new(StaticFocus::new(true)),
            );
            if !app.global().target_processes().is_empty() {
                warn!(
                    processes = app.global().target_processes().join(", "),
                    "Focus detection is unavailable, target processes are ignored"
                );
            }
            let assistant = Arc::new(Assistant::new(
                engine.clone(),
                profile,
                builder,
                store.clone(),
            ));

            let (sender, receiver) = crossbeam_channel::unbounded();
            input::hook::spawn_hook(sender)?;
            assistant.clone().spawn_dispatcher(receiver)?;
            spawn_status_log(&assistant);

            info!(config = display_path(&path), "keycue started, press Ctrl-C to exit");
            wait_for_exit(&store, &assistant).await?;

            info!("Shutting down");
            engine.shutdown().await;
        }
    }

    Ok(())
}

/// Waits for Ctrl-C. On unix a SIGHUP reloads the config and switches to its current profile.
#[cfg(unix)]
async fn wait_for_exit(store: &FileStore, assistant: &Assistant) -> Result<(), Box<dyn Error>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return Ok(result?),
            _ = hangup.recv() => {
                let app = match store.reload() {
                    Ok(app) => app,
                    Err(e) => {
                        error!(err = e.to_string(), "Unable to reload config, keeping the old one");
                        continue;
                    }
                };
                match app.active_profile() {
                    Some(profile) => assistant.set_profile(profile, app.listening_mode()),
                    None => warn!("Reloaded config has no profiles, keeping the old one"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_exit(_: &FileStore, _: &Assistant) -> Result<(), Box<dyn Error>> {
    Ok(tokio::signal::ctrl_c().await?)
}

fn active_profile(app: &App) -> Result<Profile, Box<dyn Error>> {
    Ok(app.active_profile().ok_or("no profiles configured")?)
}

/// Opens the headphone output followed by the virtual microphone.
fn open_devices(app: &App) -> Result<Vec<Arc<dyn Device>>, Box<dyn Error>> {
    let headphones = audio::get_device(app.global().headphone_device())?;
    let mic = audio::get_device(app.global().virtual_mic_device())?;
    info!(
        headphones = headphones.to_string(),
        mic = mic.to_string(),
        "Using outputs"
    );
    Ok(vec![headphones, mic])
}

/// Logs the playing list and recognized triggers as they change.
fn spawn_status_log(assistant: &Arc<Assistant>) {
    let mut playing = assistant.engine().subscribe_playing();
    tokio::spawn(async move {
        while playing.changed().await.is_ok() {
            let names = playing.borrow_and_update().clone();
            info!(playing = names.join(", "), "Now playing");
        }
    });

    let mut last = assistant.subscribe_last_trigger();
    tokio::spawn(async move {
        while last.changed().await.is_ok() {
            if let Some(trigger) = last.borrow_and_update().as_ref() {
                info!(combination = trigger.combination.as_str(), "Recognized");
            }
        }
    });
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
