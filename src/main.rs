mod audio_capture;
mod config;
mod config_persistence;
mod console_manager;
mod library_manager;
mod media_engine;
mod playback_manager;
mod protocol;
mod scoring;
mod scoring_manager;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use audio_capture::AudioLevelSampler;
use config::Config;
use console_manager::{help_text, parse_command, ConsoleCommand, ConsoleManager};
use library_manager::LibraryManager;
use media_engine::{ExternalPlayerEngine, MediaEngine, NullEngine};
use playback_manager::PlaybackManager;
use protocol::{ConfigMessage, LibraryMessage, Message, PlaybackMessage};
use scoring_manager::ScoringManager;

fn resolve_library_root(config: &Config) -> PathBuf {
    if !config.library.root_folder.is_empty() {
        return PathBuf::from(&config.library.root_folder);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roqoke")
        .join("library")
}

fn command_to_message(command: &ConsoleCommand) -> Option<Message> {
    match command {
        ConsoleCommand::Genres => Some(Message::Library(LibraryMessage::RequestGenres)),
        ConsoleCommand::Artists { genre } => {
            Some(Message::Library(LibraryMessage::RequestArtists {
                genre: genre.clone(),
            }))
        }
        ConsoleCommand::Songs { genre, artist } => {
            Some(Message::Library(LibraryMessage::RequestSongs {
                genre: genre.clone(),
                artist: artist.clone(),
            }))
        }
        ConsoleCommand::Play {
            genre,
            artist,
            song_name,
        } => Some(Message::Library(LibraryMessage::PlaySong {
            genre: genre.clone(),
            artist: artist.clone(),
            song_name: song_name.clone(),
        })),
        ConsoleCommand::Resume => Some(Message::Playback(PlaybackMessage::Resume)),
        ConsoleCommand::Pause => Some(Message::Playback(PlaybackMessage::Pause)),
        ConsoleCommand::Stop => Some(Message::Playback(PlaybackMessage::Stop)),
        ConsoleCommand::Rescan => Some(Message::Library(LibraryMessage::Rescan)),
        ConsoleCommand::Help | ConsoleCommand::Quit => None,
    }
}

fn main() {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config = match config_persistence::config_file_path() {
        Some(config_file) => {
            let config = config_persistence::load_or_create_config(&config_file);
            // Write sanitized values and any new sections back, keeping the
            // user's comments in place.
            config_persistence::save_config(&config_file, &config);
            config
        }
        None => {
            warn!("No config directory available, using defaults");
            Config::default()
        }
    };

    let library_root = resolve_library_root(&config);
    if let Err(err) = std::fs::create_dir_all(&library_root) {
        warn!(
            "Failed to create library root {}: {}",
            library_root.display(),
            err
        );
    }

    // Bus for communication between components
    let (bus_sender, _) = broadcast::channel::<Message>(1024);

    // Setup library manager
    let library_bus_receiver = bus_sender.subscribe();
    let library_bus_sender = bus_sender.clone();
    let library_manager_root = library_root.clone();
    thread::spawn(move || {
        let mut library_manager =
            LibraryManager::new(library_bus_receiver, library_bus_sender, library_manager_root);
        library_manager.run();
    });

    // Setup playback manager
    let playback_bus_receiver = bus_sender.subscribe();
    let playback_bus_sender = bus_sender.clone();
    let player_config = config.player.clone();
    thread::spawn(move || {
        let engine: Box<dyn MediaEngine> = if player_config.command.is_empty() {
            info!("No player command configured, video playback disabled");
            Box::new(NullEngine)
        } else {
            Box::new(ExternalPlayerEngine::new(
                player_config.command,
                player_config.args,
            ))
        };
        let mut playback_manager =
            PlaybackManager::new(playback_bus_receiver, playback_bus_sender, engine);
        playback_manager.run();
    });

    // Setup scoring manager. The sampler owns a live capture stream, so it
    // is built inside the thread that will drive it.
    let scoring_bus_receiver = bus_sender.subscribe();
    let scoring_bus_sender = bus_sender.clone();
    let input_config = config.input.clone();
    let scoring_config = config.scoring.clone();
    thread::spawn(move || {
        let sampler = AudioLevelSampler::new(&input_config);
        let mut scoring_manager = ScoringManager::new(
            scoring_bus_receiver,
            scoring_bus_sender,
            &scoring_config,
            Box::new(sampler),
        );
        scoring_manager.run();
    });

    // Setup console output
    let console_bus_receiver = bus_sender.subscribe();
    thread::spawn(move || {
        let mut console_manager = ConsoleManager::new(console_bus_receiver);
        console_manager.run();
    });

    let _ = bus_sender.send(Message::Config(ConfigMessage::ConfigChanged(config)));

    println!("roqoke karaoke player. Type 'help' for commands.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                warn!("Failed to read from stdin: {}", err);
                break;
            }
            None => break,
        };
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Help)) => println!("{}", help_text()),
            Ok(Some(command)) => {
                debug!("Console command: {:?}", command);
                if let Some(message) = command_to_message(&command) {
                    let _ = bus_sender.send(message);
                }
            }
            Err(err) => println!("{}", err),
        }
    }

    // Close any open scoring window and the player process before exiting;
    // the managers need a beat to drain the bus.
    let _ = bus_sender.send(Message::Playback(PlaybackMessage::Stop));
    thread::sleep(Duration::from_millis(200));

    info!("Application exiting");
}
