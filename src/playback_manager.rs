//! Playback control runtime component.
//!
//! Owns the media-engine seam and the logical playback state, and turns
//! play/pause/stop commands into `StateChanged` notifications. Those
//! notifications are the only signal the scoring bridge reacts to, so every
//! transition below is broadcast exactly once.

use log::{debug, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::media_engine::MediaEngine;
use crate::protocol::{
    LibraryItem, Message, PlaybackMessage, PlaybackState, ScoringMessage,
};

pub struct PlaybackManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    engine: Box<dyn MediaEngine>,
    state: PlaybackState,
    current_item: Option<LibraryItem>,
}

impl PlaybackManager {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        engine: Box<dyn MediaEngine>,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            engine,
            state: PlaybackState::Stopped,
            current_item: None,
        }
    }

    fn broadcast_state(&mut self, state: PlaybackState) {
        self.state = state;
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::StateChanged(state)));
    }

    fn start_item(&mut self, item: LibraryItem) {
        // Switching tracks mid-play closes the current scoring window
        // before the new one opens.
        if self.state == PlaybackState::Playing {
            self.broadcast_state(PlaybackState::Stopped);
        }
        match self.engine.play(&item.file_path) {
            Ok(()) => {
                info!(
                    "Playback: now playing {} / {} / {}",
                    item.genre, item.artist, item.song_name
                );
                self.current_item = Some(item);
                self.broadcast_state(PlaybackState::Playing);
            }
            Err(err) => {
                warn!("Playback: could not start {}: {}", item.file_path.display(), err);
                self.current_item = None;
                if self.state != PlaybackState::Stopped {
                    self.broadcast_state(PlaybackState::Stopped);
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Playback(PlaybackMessage::Play(item)) => self.start_item(item),
            Message::Playback(PlaybackMessage::Pause) => {
                if self.state == PlaybackState::Playing {
                    self.engine.pause();
                    self.broadcast_state(PlaybackState::Paused);
                } else {
                    debug!("Playback: pause ignored while {:?}", self.state);
                }
            }
            Message::Playback(PlaybackMessage::Resume) => {
                if self.state == PlaybackState::Paused {
                    match self.current_item.take() {
                        Some(item) => self.start_item(item),
                        None => debug!("Playback: resume ignored, no current item"),
                    }
                } else {
                    debug!("Playback: resume ignored while {:?}", self.state);
                }
            }
            Message::Playback(PlaybackMessage::Stop) => {
                if self.state != PlaybackState::Stopped {
                    self.engine.stop();
                    self.current_item = None;
                    self.broadcast_state(PlaybackState::Stopped);
                } else {
                    debug!("Playback: stop ignored while already stopped");
                }
            }
            // The scoring tick doubles as the poll cadence for engine-side
            // termination; it only flows while a window is open.
            Message::Scoring(ScoringMessage::Tick) => {
                if self.state == PlaybackState::Playing && self.engine.poll_finished() {
                    info!("Playback: track finished");
                    self.current_item = None;
                    self.broadcast_state(PlaybackState::Stopped);
                }
            }
            _ => {} // Ignore other messages
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("PlaybackManager: bus lagged, {} message(s) skipped", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("PlaybackManager: bus closed, exiting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::sync::broadcast::{self, Receiver};

    use super::PlaybackManager;
    use crate::media_engine::MediaEngine;
    use crate::protocol::{
        LibraryItem, Message, PlaybackMessage, PlaybackState, ScoringMessage,
    };

    #[derive(Clone, Default)]
    struct FakeEngine {
        calls: Arc<Mutex<Vec<String>>>,
        finished: Arc<AtomicBool>,
        fail_play: Arc<AtomicBool>,
    }

    impl MediaEngine for FakeEngine {
        fn play(&mut self, path: &Path) -> Result<(), String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("play {}", path.display()));
            if self.fail_play.load(Ordering::Relaxed) {
                Err("spawn failed".to_string())
            } else {
                Ok(())
            }
        }

        fn pause(&mut self) {
            self.calls.lock().unwrap().push("pause".to_string());
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop".to_string());
        }

        fn poll_finished(&mut self) -> bool {
            self.finished.swap(false, Ordering::Relaxed)
        }
    }

    fn test_item() -> LibraryItem {
        LibraryItem {
            genre: "Rock".to_string(),
            artist: "Queen".to_string(),
            song_name: "Bohemian Rhapsody".to_string(),
            file_path: PathBuf::from("/library/Rock/Queen/Bohemian Rhapsody.mp4"),
        }
    }

    fn test_manager() -> (PlaybackManager, FakeEngine, Receiver<Message>) {
        let (sender, receiver) = broadcast::channel::<Message>(32);
        let engine = FakeEngine::default();
        let manager = PlaybackManager::new(
            sender.subscribe(),
            sender,
            Box::new(engine.clone()),
        );
        (manager, engine, receiver)
    }

    fn drain_states(receiver: &mut Receiver<Message>) -> Vec<PlaybackState> {
        let mut states = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            if let Message::Playback(PlaybackMessage::StateChanged(state)) = message {
                states.push(state);
            }
        }
        states
    }

    #[test]
    fn test_play_starts_the_engine_and_broadcasts_playing() {
        let (mut manager, engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));

        assert_eq!(drain_states(&mut receiver), [PlaybackState::Playing]);
        assert_eq!(
            engine.calls.lock().unwrap().as_slice(),
            ["play /library/Rock/Queen/Bohemian Rhapsody.mp4"]
        );
    }

    #[test]
    fn test_pause_only_applies_while_playing() {
        let (mut manager, engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Pause));
        assert!(drain_states(&mut receiver).is_empty());

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));
        manager.handle_message(Message::Playback(PlaybackMessage::Pause));

        assert_eq!(
            drain_states(&mut receiver),
            [PlaybackState::Playing, PlaybackState::Paused]
        );
        assert!(engine.calls.lock().unwrap().contains(&"pause".to_string()));
    }

    #[test]
    fn test_redundant_stop_broadcasts_nothing() {
        let (mut manager, _engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));
        manager.handle_message(Message::Playback(PlaybackMessage::Stop));
        manager.handle_message(Message::Playback(PlaybackMessage::Stop));

        assert_eq!(
            drain_states(&mut receiver),
            [PlaybackState::Playing, PlaybackState::Stopped]
        );
    }

    #[test]
    fn test_switching_tracks_closes_the_previous_window_first() {
        let (mut manager, _engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));
        let mut other = test_item();
        other.song_name = "Somebody To Love".to_string();
        other.file_path = PathBuf::from("/library/Rock/Queen/Somebody To Love.mp4");
        manager.handle_message(Message::Playback(PlaybackMessage::Play(other)));

        assert_eq!(
            drain_states(&mut receiver),
            [
                PlaybackState::Playing,
                PlaybackState::Stopped,
                PlaybackState::Playing
            ]
        );
    }

    #[test]
    fn test_resume_after_pause_restarts_the_current_item() {
        let (mut manager, engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));
        manager.handle_message(Message::Playback(PlaybackMessage::Pause));
        manager.handle_message(Message::Playback(PlaybackMessage::Resume));

        assert_eq!(
            drain_states(&mut receiver),
            [
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Playing
            ]
        );
        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|call| call.starts_with("play")).count(), 2);
    }

    #[test]
    fn test_resume_without_a_pause_is_ignored() {
        let (mut manager, _engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Resume));
        assert!(drain_states(&mut receiver).is_empty());
    }

    #[test]
    fn test_engine_side_termination_is_detected_on_ticks() {
        let (mut manager, engine, mut receiver) = test_manager();

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));
        manager.handle_message(Message::Scoring(ScoringMessage::Tick));
        engine.finished.store(true, Ordering::Relaxed);
        manager.handle_message(Message::Scoring(ScoringMessage::Tick));

        assert_eq!(
            drain_states(&mut receiver),
            [PlaybackState::Playing, PlaybackState::Stopped]
        );
    }

    #[test]
    fn test_failed_engine_start_never_reports_playing() {
        let (mut manager, engine, mut receiver) = test_manager();
        engine.fail_play.store(true, Ordering::Relaxed);

        manager.handle_message(Message::Playback(PlaybackMessage::Play(test_item())));

        assert!(drain_states(&mut receiver).is_empty());
        manager.handle_message(Message::Playback(PlaybackMessage::Pause));
        assert!(drain_states(&mut receiver).is_empty());
    }
}
