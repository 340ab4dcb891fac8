//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the library
//! catalog, playback control, participation scoring, and the console
//! front-end.

use std::path::PathBuf;

use crate::config::Config;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Playback(PlaybackMessage),
    Library(LibraryMessage),
    Scoring(ScoringMessage),
    Config(ConfigMessage),
}

/// Logical playback-engine state reported by the playback manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// One entry of the genre/artist/song catalog.
///
/// Built once per scan from directory position and never mutated afterwards.
/// The file path doubles as the item identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    pub genre: String,
    pub artist: String,
    pub song_name: String,
    pub file_path: PathBuf,
}

/// Playback-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    /// Request playback of a resolved catalog item.
    Play(LibraryItem),
    Pause,
    /// Restart the current item after a pause. Opens a fresh scoring window;
    /// nothing carries over from before the pause.
    Resume,
    Stop,
    /// Logical playback state transition, consumed by the scoring bridge
    /// and the console front-end.
    StateChanged(PlaybackState),
}

/// Library-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum LibraryMessage {
    /// Discard the catalog and rebuild it wholesale from disk.
    Rescan,
    RequestGenres,
    RequestArtists {
        genre: String,
    },
    RequestSongs {
        genre: String,
        artist: String,
    },
    /// Resolve catalog coordinates to an item and request playback for it.
    PlaySong {
        genre: String,
        artist: String,
        song_name: String,
    },
    ScanCompleted {
        item_count: usize,
    },
    Genres(Vec<String>),
    Artists {
        genre: String,
        artists: Vec<String>,
    },
    Songs {
        genre: String,
        artist: String,
        songs: Vec<String>,
    },
    SongNotFound {
        genre: String,
        artist: String,
        song_name: String,
    },
}

/// Participation score reported when a scoring window closes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    /// Monotonically increasing id of the scoring window within this run.
    pub session_id: u64,
    pub active_ticks: u32,
    pub total_ticks: u32,
    /// floor(active / total * 100); 0 when no ticks elapsed.
    pub percent: u32,
    pub rating: String,
}

/// Scoring-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum ScoringMessage {
    /// Fixed-interval sampling point emitted by the tick thread while a
    /// scoring window is open. Ticks that outlive their window are ignored.
    Tick,
    /// Microphone capture could not start. The window still runs and scores
    /// silence; playback is never blocked by a capture failure.
    CaptureUnavailable(String),
    SessionFinished(ScoreCard),
}

/// Configuration-domain notifications.
#[derive(Debug, Clone)]
pub enum ConfigMessage {
    ConfigChanged(Config),
}
