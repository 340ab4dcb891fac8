//! Library catalog runtime component.
//!
//! Maintains the genre/artist/song catalog scanned from the library root and
//! serves pre-sorted query results over the bus. The catalog is immutable
//! between scans; every rescan discards it and rebuilds it wholesale.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::protocol::{ConfigMessage, LibraryItem, LibraryMessage, Message, PlaybackMessage};

pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "wmv", "mov", "mkv"];

pub fn is_supported_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_VIDEO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn subdirectories(path: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Library scan: failed to read {}: {}", path.display(), err);
            return Vec::new();
        }
    };
    let mut directories = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Library scan: failed to read entry in {}: {}", path.display(), err);
                continue;
            }
        };
        if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
            directories.push(entry.path());
        }
    }
    directories
}

fn video_files(path: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("Library scan: failed to read {}: {}", path.display(), err);
            return Vec::new();
        }
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("Library scan: failed to read entry in {}: {}", path.display(), err);
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().map(|kind| kind.is_file()).unwrap_or(false)
            && is_supported_video_file(&path)
        {
            files.push(path);
        }
    }
    files
}

fn directory_name(path: &Path) -> Option<String> {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Some(name.to_string()),
        None => {
            debug!("Library scan: skipping non-UTF-8 name {}", path.display());
            None
        }
    }
}

/// Scans `<root>/<genre>/<artist>/*` into catalog items.
///
/// Each item's (genre, artist) pair is derived purely from its directory
/// position; files at any other depth are ignored. Results come back sorted
/// by genre, artist, song.
pub fn scan_catalog(root: &Path) -> Vec<LibraryItem> {
    let mut items = Vec::new();

    for genre_dir in subdirectories(root) {
        let Some(genre) = directory_name(&genre_dir) else {
            continue;
        };
        for artist_dir in subdirectories(&genre_dir) {
            let Some(artist) = directory_name(&artist_dir) else {
                continue;
            };
            for file_path in video_files(&artist_dir) {
                let Some(song_name) = file_path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(|stem| stem.to_string())
                else {
                    debug!(
                        "Library scan: skipping non-UTF-8 name {}",
                        file_path.display()
                    );
                    continue;
                };
                items.push(LibraryItem {
                    genre: genre.clone(),
                    artist: artist.clone(),
                    song_name,
                    file_path,
                });
            }
        }
    }

    items.sort_by(|a, b| {
        (a.genre.as_str(), a.artist.as_str(), a.song_name.as_str()).cmp(&(
            b.genre.as_str(),
            b.artist.as_str(),
            b.song_name.as_str(),
        ))
    });
    items
}

/// Coordinates catalog scans and query responses.
pub struct LibraryManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    library_root: PathBuf,
    catalog: Vec<LibraryItem>,
}

impl LibraryManager {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        library_root: PathBuf,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            library_root,
            catalog: Vec::new(),
        }
    }

    fn rescan(&mut self) {
        self.catalog = scan_catalog(&self.library_root);
        info!(
            "Library: scanned {} item(s) under {}",
            self.catalog.len(),
            self.library_root.display()
        );
        let _ = self.bus_producer.send(Message::Library(LibraryMessage::ScanCompleted {
            item_count: self.catalog.len(),
        }));
    }

    fn genres(&self) -> Vec<String> {
        let unique: BTreeSet<&str> = self.catalog.iter().map(|item| item.genre.as_str()).collect();
        unique.into_iter().map(str::to_string).collect()
    }

    fn artists_of(&self, genre: &str) -> Vec<String> {
        let unique: BTreeSet<&str> = self
            .catalog
            .iter()
            .filter(|item| item.genre == genre)
            .map(|item| item.artist.as_str())
            .collect();
        unique.into_iter().map(str::to_string).collect()
    }

    fn songs_of(&self, genre: &str, artist: &str) -> Vec<String> {
        let unique: BTreeSet<&str> = self
            .catalog
            .iter()
            .filter(|item| item.genre == genre && item.artist == artist)
            .map(|item| item.song_name.as_str())
            .collect();
        unique.into_iter().map(str::to_string).collect()
    }

    fn resolve(&self, genre: &str, artist: &str, song_name: &str) -> Option<&LibraryItem> {
        self.catalog.iter().find(|item| {
            item.genre == genre && item.artist == artist && item.song_name == song_name
        })
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Library(LibraryMessage::Rescan) => self.rescan(),
            Message::Library(LibraryMessage::RequestGenres) => {
                let _ = self
                    .bus_producer
                    .send(Message::Library(LibraryMessage::Genres(self.genres())));
            }
            Message::Library(LibraryMessage::RequestArtists { genre }) => {
                let artists = self.artists_of(&genre);
                let _ = self
                    .bus_producer
                    .send(Message::Library(LibraryMessage::Artists { genre, artists }));
            }
            Message::Library(LibraryMessage::RequestSongs { genre, artist }) => {
                let songs = self.songs_of(&genre, &artist);
                let _ = self.bus_producer.send(Message::Library(LibraryMessage::Songs {
                    genre,
                    artist,
                    songs,
                }));
            }
            Message::Library(LibraryMessage::PlaySong {
                genre,
                artist,
                song_name,
            }) => match self.resolve(&genre, &artist, &song_name) {
                Some(item) => {
                    let _ = self
                        .bus_producer
                        .send(Message::Playback(PlaybackMessage::Play(item.clone())));
                }
                None => {
                    warn!(
                        "Library: no catalog entry for {}/{}/{}",
                        genre, artist, song_name
                    );
                    let _ = self.bus_producer.send(Message::Library(
                        LibraryMessage::SongNotFound {
                            genre,
                            artist,
                            song_name,
                        },
                    ));
                }
            },
            Message::Config(ConfigMessage::ConfigChanged(config)) => {
                if !config.library.root_folder.is_empty() {
                    let next_root = PathBuf::from(&config.library.root_folder);
                    if next_root != self.library_root {
                        info!("Library: root changed to {}", next_root.display());
                        self.library_root = next_root;
                        self.rescan();
                    }
                }
            }
            _ => {} // Ignore other messages
        }
    }

    pub fn run(&mut self) {
        self.rescan();
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("LibraryManager: bus lagged, {} message(s) skipped", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("LibraryManager: bus closed, exiting");
                    break;
                }
            }
        }
    }
}
