use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::composer::{ComposerConfig, ComposerError};

pub const DEFAULT_CONFIG_PATH: &str = "handspell.toml";

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub composer: ComposerSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============================================================================
// Server Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

// ============================================================================
// Composer Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ComposerSettings {
    /// Minimum spacing between classifier invocations, in seconds
    #[serde(default = "default_prediction_interval")]
    pub prediction_interval_secs: f64,

    /// Hold time before a letter commits (and between repeated commits), in seconds
    #[serde(default = "default_letter_add_interval")]
    pub letter_add_interval_secs: f64,

    /// Minimum classifier confidence to count as a detection (0.0-1.0)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            prediction_interval_secs: default_prediction_interval(),
            letter_add_interval_secs: default_letter_add_interval(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl ComposerSettings {
    pub fn to_composer_config(&self) -> Result<ComposerConfig, ComposerError> {
        ComposerConfig::from_secs(
            self.prediction_interval_secs,
            self.letter_add_interval_secs,
            self.confidence_threshold,
        )
    }
}

fn default_prediction_interval() -> f64 {
    0.5
}

fn default_letter_add_interval() -> f64 {
    1.5
}

fn default_confidence_threshold() -> f32 {
    0.7
}

// ============================================================================
// Session Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SessionSettings {
    /// Upper bound on concurrently tracked sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions untouched for this long are discarded
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the idle sweep runs
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_secs: default_idle_timeout(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

fn default_max_sessions() -> usize {
    64
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

fn default_prune_interval() -> u64 {
    60
}

// ============================================================================
// Vision Config
// ============================================================================

/// Hand detector tuning; opaque to the composer
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    #[serde(default = "default_max_hands")]
    pub max_hands: usize,
    /// Hands the detector scores below this are discarded
    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            max_hands: default_max_hands(),
            min_detection_confidence: default_min_detection_confidence(),
        }
    }
}

fn default_max_hands() -> usize {
    1
}

fn default_min_detection_confidence() -> f32 {
    0.5
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClassifierSettings {
    /// Class index -> character table; each entry must be a single character
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            labels: default_labels(),
        }
    }
}

fn default_labels() -> Vec<String> {
    ('A'..='Z').map(String::from).collect()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScriptedScore {
    pub class: usize,
    pub confidence: f32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "backend")]
pub enum VisionConfig {
    /// Detector that never finds a hand; words are built through edits only
    #[serde(rename = "none")]
    Disabled,
    /// Synthetic hands and a cycling list of class scores
    #[serde(rename = "scripted")]
    Scripted {
        #[serde(default = "default_scripted_hands")]
        hands: usize,
        #[serde(default = "default_scripted_hand_score")]
        hand_score: f32,
        #[serde(default)]
        scores: Vec<ScriptedScore>,
    },
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig::Disabled
    }
}

fn default_scripted_hands() -> usize {
    1
}

fn default_scripted_hand_score() -> f32 {
    0.9
}

// ============================================================================
// Logging Config
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset ("info", "handspell=debug", ...)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormatConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormatConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    ///
    /// Only the default location may be absent (yielding the defaults); an
    /// explicit path must exist. A file that does not parse is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path: PathBuf = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    bail!("config file {} not found", explicit.display());
                }
                explicit.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Config::default());
                }
                default
            }
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.composer.to_composer_config()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.composer.prediction_interval_secs, 0.5);
        assert_eq!(config.composer.letter_add_interval_secs, 1.5);
        assert_eq!(config.composer.confidence_threshold, 0.7);
        assert_eq!(config.classifier.labels.len(), 26);
        assert_eq!(config.classifier.labels[0], "A");
        assert_eq!(config.vision, VisionConfig::Disabled);
        assert_eq!(config.logging.format, LogFormatConfig::Text);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9100

            [composer]
            letter_add_interval_secs = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.composer.letter_add_interval_secs, 2.0);
        assert_eq!(config.composer.prediction_interval_secs, 0.5);
    }

    #[test]
    fn test_scripted_backend() {
        let config = Config::from_toml(
            r#"
            [detector]
            min_detection_confidence = 0.7

            [vision]
            backend = "scripted"
            hands = 2
            hand_score = 0.65
            scores = [{ class = 0, confidence = 0.9 }, { class = 1, confidence = 0.4 }]
            "#,
        )
        .unwrap();

        match config.vision {
            VisionConfig::Scripted {
                hands,
                hand_score,
                scores,
            } => {
                assert_eq!(hands, 2);
                assert_eq!(hand_score, 0.65);
                assert_eq!(scores.len(), 2);
                assert_eq!(scores[1], ScriptedScore { class: 1, confidence: 0.4 });
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert_eq!(config.detector.min_detection_confidence, 0.7);
        assert_eq!(config.detector.max_hands, 1);
    }

    #[test]
    fn test_invalid_composer_values_rejected() {
        assert!(Config::from_toml("[composer]\nconfidence_threshold = 1.2\n").is_err());
        assert!(Config::from_toml("[composer]\nprediction_interval_secs = 0.0\n").is_err());
        assert!(Config::from_toml("[composer]\nletter_add_interval_secs = -1.0\n").is_err());
    }

    #[test]
    fn test_load_without_path_falls_back_to_defaults() {
        // run from a directory without handspell.toml
        let config = if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Config::default()
        } else {
            Config::load(None).unwrap()
        };
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_missing_explicit_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo-handspell.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("typo-handspell.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\nformat = \"json\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormatConfig::Json);
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
