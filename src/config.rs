//! Persistent application configuration model and defaults.

use crate::scoring::{RatingBand, RatingScale};

/// Root configuration persisted to `roqoke.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Library root and scan preferences.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Microphone input preferences.
    pub input: InputConfig,
    #[serde(default)]
    /// Participation-scoring policy.
    pub scoring: ScoringConfig,
    #[serde(default)]
    /// External media-player command used for video playback.
    pub player: PlayerConfig,
}

/// Library location preferences.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    /// Root folder of the genre/artist/song tree. Empty selects the
    /// default location under the user config directory.
    #[serde(default)]
    pub root_folder: String,
}

/// Microphone input preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub device_name: String,
    #[serde(default = "default_true")]
    pub device_auto: bool,
    #[serde(default = "default_input_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_input_channels")]
    pub channels: u16,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            device_auto: true,
            sample_rate: default_input_sample_rate(),
            channels: default_input_channels(),
        }
    }
}

/// One rating band as persisted: the label awarded at or above a ratio.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RatingBandConfig {
    pub min_ratio: f64,
    pub label: String,
}

/// Participation-scoring policy.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ScoringConfig {
    /// Fixed sampling interval of the scoring tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// A tick counts as active when loudness is strictly above this.
    #[serde(default = "default_activity_threshold")]
    pub activity_threshold: f32,
    /// Ordered rating table, highest minimum first.
    #[serde(default = "default_rating_scale")]
    pub rating_scale: Vec<RatingBandConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            activity_threshold: default_activity_threshold(),
            rating_scale: default_rating_scale(),
        }
    }
}

impl ScoringConfig {
    /// Materializes the persisted rating table into the evaluation order
    /// used by the scoring engine.
    pub fn to_scale(&self) -> RatingScale {
        RatingScale::new(
            self.rating_scale
                .iter()
                .map(|band| RatingBand::new(band.min_ratio, &band.label))
                .collect(),
        )
    }
}

/// External media-player preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlayerConfig {
    /// Player executable invoked per track. Empty disables video playback
    /// (state transitions still flow for scoring).
    #[serde(default = "default_player_command")]
    pub command: String,
    /// Extra arguments placed before the file path.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command: default_player_command(),
            args: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_input_sample_rate() -> u32 {
    44_100
}

fn default_input_channels() -> u16 {
    1
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_activity_threshold() -> f32 {
    crate::scoring::DEFAULT_ACTIVITY_THRESHOLD
}

fn default_rating_scale() -> Vec<RatingBandConfig> {
    vec![
        RatingBandConfig {
            min_ratio: 0.8,
            label: "GOLD".to_string(),
        },
        RatingBandConfig {
            min_ratio: 0.5,
            label: "SILVER".to_string(),
        },
        RatingBandConfig {
            min_ratio: 0.2,
            label: "BRONZE".to_string(),
        },
        RatingBandConfig {
            min_ratio: 0.0,
            label: "SING LOUDER".to_string(),
        },
    ]
}

fn default_player_command() -> String {
    "mpv".to_string()
}

/// Clamps user-edited values back into ranges the runtime can work with.
pub fn sanitize_config(mut config: Config) -> Config {
    if !config.scoring.activity_threshold.is_finite() {
        config.scoring.activity_threshold = default_activity_threshold();
    }
    config.scoring.activity_threshold = config.scoring.activity_threshold.clamp(0.0, 1.0);

    config.scoring.tick_interval_ms = config.scoring.tick_interval_ms.clamp(10, 10_000);

    config
        .scoring
        .rating_scale
        .retain(|band| band.min_ratio.is_finite() && (0.0..=1.0).contains(&band.min_ratio));
    if config.scoring.rating_scale.is_empty() {
        config.scoring.rating_scale = default_rating_scale();
    }

    if config.input.sample_rate == 0 {
        config.input.sample_rate = default_input_sample_rate();
    }
    if config.input.channels == 0 {
        config.input.channels = default_input_channels();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::{sanitize_config, Config, RatingBandConfig};

    #[test]
    fn test_default_config_has_expected_values_and_default_rating_table() {
        let config = Config::default();

        assert!(config.library.root_folder.is_empty());

        assert!(config.input.device_name.is_empty());
        assert!(config.input.device_auto);
        assert_eq!(config.input.sample_rate, 44_100);
        assert_eq!(config.input.channels, 1);

        assert_eq!(config.scoring.tick_interval_ms, 100);
        assert!((config.scoring.activity_threshold - 0.01).abs() < f32::EPSILON);
        let labels: Vec<&str> = config
            .scoring
            .rating_scale
            .iter()
            .map(|band| band.label.as_str())
            .collect();
        assert_eq!(labels, ["GOLD", "SILVER", "BRONZE", "SING LOUDER"]);
        let ratios: Vec<f64> = config
            .scoring
            .rating_scale
            .iter()
            .map(|band| band.min_ratio)
            .collect();
        assert_eq!(ratios, [0.8, 0.5, 0.2, 0.0]);

        assert_eq!(config.player.command, "mpv");
        assert!(config.player.args.is_empty());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).expect("serialize");
        let restored: Config = toml::from_str(&text).expect("deserialize");
        assert_eq!(config, restored);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[library]\nroot_folder = \"/videos\"\n")
            .expect("partial config should parse");
        assert_eq!(config.library.root_folder, "/videos");
        assert_eq!(config.scoring.tick_interval_ms, 100);
        assert_eq!(config.player.command, "mpv");
    }

    #[test]
    fn test_sanitize_clamps_threshold_and_tick_interval() {
        let mut config = Config::default();
        config.scoring.activity_threshold = 4.2;
        config.scoring.tick_interval_ms = 1;
        let config = sanitize_config(config);

        assert_eq!(config.scoring.activity_threshold, 1.0);
        assert_eq!(config.scoring.tick_interval_ms, 10);
    }

    #[test]
    fn test_sanitize_restores_default_scale_when_all_bands_are_invalid() {
        let mut config = Config::default();
        config.scoring.rating_scale = vec![RatingBandConfig {
            min_ratio: f64::NAN,
            label: "BAD".to_string(),
        }];
        let config = sanitize_config(config);

        assert_eq!(config.scoring.rating_scale.len(), 4);
        assert_eq!(config.scoring.rating_scale[0].label, "GOLD");
    }

    #[test]
    fn test_custom_scale_survives_sanitize_and_materializes_in_order() {
        let mut config = Config::default();
        config.scoring.rating_scale = vec![
            RatingBandConfig {
                min_ratio: 0.3,
                label: "OK".to_string(),
            },
            RatingBandConfig {
                min_ratio: 0.9,
                label: "STAR".to_string(),
            },
        ];
        let config = sanitize_config(config);
        let scale = config.scoring.to_scale();

        assert_eq!(scale.classify(0.95), "STAR");
        assert_eq!(scale.classify(0.5), "OK");
    }
}
