//! Participation-scoring state machine and rating policy.
//!
//! A scoring window opens when playback starts and closes on the next pause
//! or stop. While the window is open a fixed-interval tick samples the
//! current microphone loudness; the closed window is graded by the fraction
//! of ticks that were louder than the activity threshold.

use log::debug;

use crate::protocol::ScoreCard;

/// Loudness must be strictly greater than this to count a tick as active.
pub const DEFAULT_ACTIVITY_THRESHOLD: f32 = 0.01;

/// One band of the rating scale: the label awarded at or above a ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingBand {
    pub min_ratio: f64,
    pub label: String,
}

impl RatingBand {
    pub fn new(min_ratio: f64, label: &str) -> Self {
        Self {
            min_ratio,
            label: label.to_string(),
        }
    }
}

/// Ordered rating policy. Bands are evaluated from the highest minimum ratio
/// down; the first band whose minimum the ratio reaches (inclusive) wins.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingScale {
    bands: Vec<RatingBand>,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self::new(vec![
            RatingBand::new(0.8, "GOLD"),
            RatingBand::new(0.5, "SILVER"),
            RatingBand::new(0.2, "BRONZE"),
            RatingBand::new(0.0, "SING LOUDER"),
        ])
    }
}

impl RatingScale {
    /// Builds a scale from bands in any order. Bands with a non-finite or
    /// out-of-range minimum are dropped; an empty result falls back to the
    /// default scale.
    pub fn new(bands: Vec<RatingBand>) -> Self {
        let mut bands: Vec<RatingBand> = bands
            .into_iter()
            .filter(|band| band.min_ratio.is_finite() && (0.0..=1.0).contains(&band.min_ratio))
            .collect();
        if bands.is_empty() {
            return Self::default();
        }
        bands.sort_by(|a, b| {
            b.min_ratio
                .partial_cmp(&a.min_ratio)
                .expect("non-finite ratios filtered above")
        });
        Self { bands }
    }

    /// Label for a participation ratio in [0.0, 1.0].
    pub fn classify(&self, ratio: f64) -> &str {
        for band in &self.bands {
            if ratio >= band.min_ratio {
                return &band.label;
            }
        }
        // Reachable only when no band has a 0.0 minimum.
        &self
            .bands
            .last()
            .expect("scale always holds at least one band")
            .label
    }
}

/// Bounded-lifetime scoring window: `Idle -> Running -> Idle`.
///
/// The session itself is single-threaded; the scoring manager serializes
/// start, tick, and stop through its run loop. Ticks and stops arriving
/// while Idle are ignored rather than rejected, since the tick thread and
/// the playback bridge may legitimately race against a stop.
pub struct ScoringSession {
    total_ticks: u32,
    active_ticks: u32,
    is_running: bool,
    activity_threshold: f32,
    scale: RatingScale,
    session_id: u64,
    next_session_id: u64,
}

impl ScoringSession {
    pub fn new(activity_threshold: f32, scale: RatingScale) -> Self {
        Self {
            total_ticks: 0,
            active_ticks: 0,
            is_running: false,
            activity_threshold,
            scale,
            session_id: 0,
            next_session_id: 1,
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Replaces the grading policy. Ignored while a window is open so that a
    /// window is graded by the policy it started under.
    pub fn set_policy(&mut self, activity_threshold: f32, scale: RatingScale) {
        if self.is_running {
            debug!("Scoring: policy change ignored while a window is open");
            return;
        }
        self.activity_threshold = activity_threshold;
        self.scale = scale;
    }

    /// Opens a new scoring window with both counters reset to zero.
    /// No-op when a window is already open.
    pub fn start(&mut self) {
        if self.is_running {
            debug!("Scoring: start ignored, window already open");
            return;
        }
        self.total_ticks = 0;
        self.active_ticks = 0;
        self.session_id = self.next_session_id;
        self.next_session_id += 1;
        self.is_running = true;
        debug!("Scoring: window {} opened", self.session_id);
    }

    /// Applies one sampling point. Counts the tick as active when the
    /// loudness is strictly greater than the activity threshold.
    /// No-op when Idle.
    pub fn tick(&mut self, loudness: f32) {
        if !self.is_running {
            return;
        }
        self.total_ticks += 1;
        if loudness > self.activity_threshold {
            self.active_ticks += 1;
        }
    }

    /// Closes the window and returns its score. The counters are frozen the
    /// instant this runs; a redundant stop returns `None` and mutates
    /// nothing.
    pub fn stop(&mut self) -> Option<ScoreCard> {
        if !self.is_running {
            return None;
        }
        self.is_running = false;
        let ratio = if self.total_ticks == 0 {
            0.0
        } else {
            f64::from(self.active_ticks) / f64::from(self.total_ticks)
        };
        let percent = (ratio * 100.0).floor() as u32;
        let rating = self.scale.classify(ratio).to_string();
        debug!(
            "Scoring: window {} closed, {}/{} active ticks, {}%, {}",
            self.session_id, self.active_ticks, self.total_ticks, percent, rating
        );
        Some(ScoreCard {
            session_id: self.session_id,
            active_ticks: self.active_ticks,
            total_ticks: self.total_ticks,
            percent,
            rating,
        })
    }
}
