//! Media-engine seam for delegated video playback.
//!
//! Video decoding and rendering never happen in this process. The playback
//! manager drives a `MediaEngine`, and the stock implementation hands each
//! track to an external player process.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use log::{debug, error, warn};

/// External collaborator handling the actual video playback.
pub trait MediaEngine: Send {
    /// Starts playback of a file, replacing whatever was playing.
    fn play(&mut self, path: &Path) -> Result<(), String>;
    /// Best-effort pause. Engines that cannot pause stop instead; the
    /// logical playback state is tracked by the caller either way.
    fn pause(&mut self);
    fn stop(&mut self);
    /// True when the engine finished playback on its own since the last
    /// call. Polled on scoring ticks while playing.
    fn poll_finished(&mut self) -> bool;
}

/// Plays each track by spawning the configured player command.
///
/// The child is killed on stop. An external process offers no portable
/// pause control, so pause also terminates it; the scoring window closes
/// either way, which is the behavior pause exists for here.
pub struct ExternalPlayerEngine {
    command: String,
    args: Vec<String>,
    child: Option<Child>,
}

impl ExternalPlayerEngine {
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self {
            command,
            args,
            child: None,
        }
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                // Already exited is the common case here.
                debug!("Engine: kill failed ({}), reaping", err);
            }
            if let Err(err) = child.wait() {
                warn!("Engine: failed to reap player process: {}", err);
            }
        }
    }
}

impl Drop for ExternalPlayerEngine {
    fn drop(&mut self) {
        self.kill_child();
    }
}

impl MediaEngine for ExternalPlayerEngine {
    fn play(&mut self, path: &Path) -> Result<(), String> {
        self.kill_child();
        match Command::new(&self.command)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                debug!(
                    "Engine: spawned '{}' (pid {}) for {}",
                    self.command,
                    child.id(),
                    path.display()
                );
                self.child = Some(child);
                Ok(())
            }
            Err(err) => {
                error!("Engine: failed to spawn '{}': {}", self.command, err);
                Err(format!("failed to spawn '{}': {}", self.command, err))
            }
        }
    }

    fn pause(&mut self) {
        self.kill_child();
    }

    fn stop(&mut self) {
        self.kill_child();
    }

    fn poll_finished(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Engine: player exited with {}", status);
                self.child = None;
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("Engine: failed to poll player process: {}", err);
                false
            }
        }
    }
}

/// Engine that renders nothing. Used when no player command is configured;
/// playback state transitions still flow so scoring works unchanged.
#[derive(Debug, Default)]
pub struct NullEngine;

impl MediaEngine for NullEngine {
    fn play(&mut self, path: &Path) -> Result<(), String> {
        debug!("Engine: null engine 'playing' {}", path.display());
        Ok(())
    }

    fn pause(&mut self) {}

    fn stop(&mut self) {}

    fn poll_finished(&mut self) -> bool {
        false
    }
}
