//! Participation-scoring runtime component.
//!
//! Bridges playback state to the scoring session: a transition into Playing
//! opens a scoring window and starts microphone capture, a transition into
//! Paused or Stopped closes the window and reports its score. Any pause,
//! even a momentary one, ends the window; resuming opens a fresh one with
//! counters at zero.
//!
//! While a window is open a tick thread posts `ScoringMessage::Tick` on the
//! bus at the configured interval. All session transitions happen inside
//! this manager's run loop, which serializes start and stop against each
//! other; only the loudness slot itself is shared with the capture callback.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::{error::RecvError, Receiver, Sender};

use crate::audio_capture::LevelCapture;
use crate::config::ScoringConfig;
use crate::protocol::{
    ConfigMessage, Message, PlaybackMessage, PlaybackState, ScoringMessage,
};
use crate::scoring::ScoringSession;

pub struct ScoringManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    session: ScoringSession,
    capture: Box<dyn LevelCapture>,
    tick_interval: Duration,
    tick_alive: Option<Arc<AtomicBool>>,
}

impl ScoringManager {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        config: &ScoringConfig,
        capture: Box<dyn LevelCapture>,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            session: ScoringSession::new(config.activity_threshold, config.to_scale()),
            capture,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            tick_alive: None,
        }
    }

    fn spawn_tick_thread(&mut self) {
        let alive = Arc::new(AtomicBool::new(true));
        let thread_alive = alive.clone();
        let sender = self.bus_producer.clone();
        let interval = self.tick_interval;
        thread::spawn(move || {
            while thread_alive.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if !thread_alive.load(Ordering::Relaxed) {
                    break;
                }
                if sender.send(Message::Scoring(ScoringMessage::Tick)).is_err() {
                    break;
                }
            }
        });
        self.tick_alive = Some(alive);
    }

    fn open_window(&mut self) {
        if self.session.is_running() {
            debug!("Scoring: window already open, duplicate play state ignored");
            return;
        }
        self.session.start();
        if let Err(err) = self.capture.start() {
            // Scoring still runs; the window grades silence. Playback is
            // never blocked by a microphone failure.
            warn!("Scoring: {}", err);
            let _ = self.bus_producer.send(Message::Scoring(
                ScoringMessage::CaptureUnavailable(err.to_string()),
            ));
        }
        self.spawn_tick_thread();
    }

    fn close_window(&mut self) {
        if let Some(alive) = self.tick_alive.take() {
            alive.store(false, Ordering::Relaxed);
        }
        self.capture.stop();
        if let Some(card) = self.session.stop() {
            info!(
                "Scoring: window {} scored {}% ({})",
                card.session_id, card.percent, card.rating
            );
            let _ = self
                .bus_producer
                .send(Message::Scoring(ScoringMessage::SessionFinished(card)));
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Playback(PlaybackMessage::StateChanged(PlaybackState::Playing)) => {
                self.open_window();
            }
            Message::Playback(PlaybackMessage::StateChanged(
                PlaybackState::Paused | PlaybackState::Stopped,
            )) => {
                self.close_window();
            }
            Message::Scoring(ScoringMessage::Tick) => {
                // A tick that raced a stop finds the session Idle and is
                // ignored inside the session.
                self.session.tick(self.capture.level());
            }
            Message::Config(ConfigMessage::ConfigChanged(config)) => {
                self.session
                    .set_policy(config.scoring.activity_threshold, config.scoring.to_scale());
                self.tick_interval = Duration::from_millis(config.scoring.tick_interval_ms);
            }
            _ => {} // Ignore other messages
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("ScoringManager: bus lagged, {} message(s) skipped", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("ScoringManager: bus closed, exiting");
                    break;
                }
            }
        }
    }
}
