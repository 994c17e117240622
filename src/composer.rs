//! Word composer - debounces per-frame letter guesses into a composed word
//!
//! A classifier produces a (letter, confidence) guess for single frames. The
//! stream flutters, so the composer:
//!
//! - **Gates** how often the classifier is consulted (`prediction_interval`)
//! - **Filters** guesses below `confidence_threshold` to "no detection"
//! - **Holds** a letter once it stays unchanged, tracking when the hold began
//! - **Commits** a held letter after `letter_add_interval` of dwell, and at
//!   most once per interval while the hold continues (double letters work by
//!   keeping the hand still)
//!
//! Explicit edits (space, delete, clear, reset) bypass all of the above.
//! Time is always passed in; the composer never reads a clock itself.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::clock::Timestamp;

const DEFAULT_PREDICTION_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_LETTER_ADD_INTERVAL: Duration = Duration::from_millis(1500);
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComposerError {
    #[error("{name} must be strictly positive")]
    ZeroInterval { name: &'static str },

    #[error("{name} is not a valid duration: {reason}")]
    InvalidInterval { name: &'static str, reason: String },

    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),
}

/// Timing policy of a composer, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposerConfig {
    prediction_interval: Duration,
    letter_add_interval: Duration,
    confidence_threshold: f32,
}

impl ComposerConfig {
    pub fn new(
        prediction_interval: Duration,
        letter_add_interval: Duration,
        confidence_threshold: f32,
    ) -> Result<Self, ComposerError> {
        if prediction_interval.is_zero() {
            return Err(ComposerError::ZeroInterval {
                name: "prediction interval",
            });
        }
        if letter_add_interval.is_zero() {
            return Err(ComposerError::ZeroInterval {
                name: "letter add interval",
            });
        }
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ComposerError::InvalidThreshold(confidence_threshold));
        }
        Ok(Self {
            prediction_interval,
            letter_add_interval,
            confidence_threshold,
        })
    }

    /// Build from fractional seconds, as they appear in config files
    pub fn from_secs(
        prediction_interval_secs: f64,
        letter_add_interval_secs: f64,
        confidence_threshold: f32,
    ) -> Result<Self, ComposerError> {
        let prediction_interval = interval_from_secs("prediction interval", prediction_interval_secs)?;
        let letter_add_interval = interval_from_secs("letter add interval", letter_add_interval_secs)?;
        Self::new(prediction_interval, letter_add_interval, confidence_threshold)
    }

    pub fn prediction_interval(&self) -> Duration {
        self.prediction_interval
    }

    pub fn letter_add_interval(&self) -> Duration {
        self.letter_add_interval
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            prediction_interval: DEFAULT_PREDICTION_INTERVAL,
            letter_add_interval: DEFAULT_LETTER_ADD_INTERVAL,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

fn interval_from_secs(name: &'static str, secs: f64) -> Result<Duration, ComposerError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ComposerError::InvalidInterval {
        name,
        reason: e.to_string(),
    })
}

/// Read-only view of a composer at a given instant
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerSnapshot {
    pub current_letter: Option<char>,
    pub current_confidence: f32,
    pub composed_word: String,
    pub time_until_next_add: Duration,
}

/// Debounce state and composed word for one session
#[derive(Debug, Clone)]
pub struct WordComposer {
    config: ComposerConfig,
    word: String,
    current_letter: Option<char>,
    current_confidence: f32,
    stable_letter: Option<char>,
    stable_since: Timestamp,
    /// `None` until the first gate check, so the first frame is always classified
    last_prediction_attempt: Option<Timestamp>,
    last_commit_at: Timestamp,
}

impl WordComposer {
    pub fn new(config: ComposerConfig, now: Timestamp) -> Self {
        Self {
            config,
            word: String::new(),
            current_letter: None,
            current_confidence: 0.0,
            stable_letter: None,
            stable_since: now,
            last_prediction_attempt: None,
            last_commit_at: now,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    // ========================================================================
    // Prediction path
    // ========================================================================

    /// Rate limiter for classifier invocations; records the attempt when it
    /// lets one through
    pub fn should_predict(&mut self, now: Timestamp) -> bool {
        let allowed = match self.last_prediction_attempt {
            None => true,
            Some(last) => now.saturating_since(last) >= self.config.prediction_interval,
        };
        if allowed {
            self.last_prediction_attempt = Some(now);
        }
        allowed
    }

    /// Ingest one classifier result (`None` means no hand / no detection)
    pub fn update_prediction(&mut self, letter: Option<char>, confidence: f32, now: Timestamp) {
        let confidence = clamp_confidence(confidence);
        let (letter, confidence) = match letter {
            Some(c) if confidence >= self.config.confidence_threshold => (Some(c), confidence),
            _ => (None, 0.0),
        };

        if letter != self.stable_letter {
            trace!(from = ?self.stable_letter, to = ?letter, at = %now, "stable letter changed");
            self.stable_letter = letter;
            self.stable_since = now;
        }

        self.current_letter = letter;
        self.current_confidence = confidence;
    }

    /// Commit the held letter if it has dwelled long enough and the previous
    /// commit is at least one interval old
    pub fn try_add_letter(&mut self, now: Timestamp) -> Option<char> {
        let letter = self.stable_letter?;
        let interval = self.config.letter_add_interval;

        if now.saturating_since(self.stable_since) < interval
            || now.saturating_since(self.last_commit_at) < interval
        {
            return None;
        }

        self.word.push(letter);
        self.last_commit_at = now;
        debug!(letter = %letter, word = %self.word, at = %now, "letter committed");
        Some(letter)
    }

    pub fn snapshot(&self, now: Timestamp) -> ComposerSnapshot {
        ComposerSnapshot {
            current_letter: self.current_letter,
            current_confidence: self.current_confidence,
            composed_word: self.word.clone(),
            time_until_next_add: self.time_until_next_add(now),
        }
    }

    pub fn time_until_next_add(&self, now: Timestamp) -> Duration {
        self.config
            .letter_add_interval
            .saturating_sub(now.saturating_since(self.last_commit_at))
    }

    // ========================================================================
    // Edits
    // ========================================================================

    pub fn add_space(&mut self) {
        self.word.push(' ');
    }

    /// Remove the last character; returns it, or `None` if the word was empty
    pub fn delete_last_character(&mut self) -> Option<char> {
        self.word.pop()
    }

    /// Empty the word and hand back what it contained. Timers and the held
    /// letter are left alone.
    pub fn clear_word(&mut self) -> String {
        std::mem::take(&mut self.word)
    }

    /// Back to a freshly constructed state, keeping the config
    pub fn reset(&mut self, now: Timestamp) {
        self.word.clear();
        self.current_letter = None;
        self.current_confidence = 0.0;
        self.stable_letter = None;
        self.stable_since = now;
        self.last_prediction_attempt = Some(now);
        self.last_commit_at = now;
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn stable_letter(&self) -> Option<char> {
        self.stable_letter
    }

    pub fn stable_since(&self) -> Timestamp {
        self.stable_since
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn composer() -> WordComposer {
        WordComposer::new(ComposerConfig::default(), Timestamp::ZERO)
    }

    #[test]
    fn test_default_config() {
        let config = ComposerConfig::default();
        assert_eq!(config.prediction_interval(), Duration::from_millis(500));
        assert_eq!(config.letter_add_interval(), Duration::from_millis(1500));
        assert_eq!(config.confidence_threshold(), 0.7);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            ComposerConfig::new(Duration::ZERO, Duration::from_secs(1), 0.5),
            Err(ComposerError::ZeroInterval { .. })
        ));
        assert!(matches!(
            ComposerConfig::new(Duration::from_secs(1), Duration::ZERO, 0.5),
            Err(ComposerError::ZeroInterval { .. })
        ));
        assert!(matches!(
            ComposerConfig::new(Duration::from_secs(1), Duration::from_secs(1), 1.5),
            Err(ComposerError::InvalidThreshold(_))
        ));
        assert!(matches!(
            ComposerConfig::new(Duration::from_secs(1), Duration::from_secs(1), f32::NAN),
            Err(ComposerError::InvalidThreshold(_))
        ));
        assert!(matches!(
            ComposerConfig::from_secs(-0.5, 1.5, 0.7),
            Err(ComposerError::InvalidInterval { .. })
        ));
        assert!(ComposerConfig::from_secs(0.25, 1.0, 0.0).is_ok());
        assert!(ComposerConfig::from_secs(0.25, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_first_gate_check_is_allowed() {
        let mut c = composer();
        assert!(c.should_predict(ms(0)));
        assert!(!c.should_predict(ms(0)));
    }

    #[test]
    fn test_gate_allows_once_per_interval() {
        let mut c = composer();
        let allowed: Vec<u64> = (0..=20)
            .map(|i| i * 100)
            .filter(|&t| c.should_predict(ms(t)))
            .collect();
        assert_eq!(allowed, vec![0, 500, 1000, 1500, 2000]);
    }

    #[test]
    fn test_gate_measures_from_last_allowed_attempt() {
        let mut c = composer();
        assert!(c.should_predict(ms(0)));
        assert!(!c.should_predict(ms(499)));
        assert!(c.should_predict(ms(730)));
        assert!(!c.should_predict(ms(1200)));
        assert!(c.should_predict(ms(1230)));
    }

    #[test]
    fn test_low_confidence_is_no_detection() {
        let mut a = composer();
        let mut b = composer();

        a.update_prediction(Some('C'), 0.69, ms(100));
        b.update_prediction(None, 0.0, ms(100));

        assert_eq!(a.stable_letter(), b.stable_letter());
        assert_eq!(a.stable_since(), b.stable_since());
        assert_eq!(a.snapshot(ms(100)).current_letter, None);
        assert_eq!(a.snapshot(ms(100)).current_confidence, 0.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.7, ms(0));
        assert_eq!(c.stable_letter(), Some('A'));
    }

    #[test]
    fn test_confidence_is_clamped() {
        let mut c = composer();
        c.update_prediction(Some('A'), 1.7, ms(0));
        assert_eq!(c.snapshot(ms(0)).current_confidence, 1.0);

        c.update_prediction(Some('A'), f32::NAN, ms(10));
        assert_eq!(c.snapshot(ms(10)).current_confidence, 0.0);
        assert_eq!(c.stable_letter(), None);
    }

    #[test]
    fn test_same_letter_keeps_dwell_clock() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(200));
        c.update_prediction(Some('A'), 0.8, ms(700));
        assert_eq!(c.stable_since(), ms(200));
        assert_eq!(c.snapshot(ms(700)).current_confidence, 0.8);
    }

    #[test]
    fn test_empty_sample_restarts_dwell() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(0));
        c.update_prediction(None, 0.0, ms(500));
        assert_eq!(c.stable_since(), ms(500));
        c.update_prediction(Some('A'), 0.9, ms(1000));
        assert_eq!(c.stable_since(), ms(1000));
        assert_eq!(c.try_add_letter(ms(2000)), None);
        assert_eq!(c.try_add_letter(ms(2500)), Some('A'));
    }

    #[test]
    fn test_no_commit_without_letter() {
        let mut c = composer();
        assert_eq!(c.try_add_letter(ms(10_000)), None);
        c.update_prediction(None, 0.0, ms(0));
        assert_eq!(c.try_add_letter(ms(10_000)), None);
        assert_eq!(c.word(), "");
    }

    #[test]
    fn test_commit_after_dwell() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(0));
        assert_eq!(c.try_add_letter(ms(1499)), None);
        assert_eq!(c.try_add_letter(ms(1500)), Some('A'));
        assert_eq!(c.try_add_letter(ms(1500)), None);
        assert_eq!(c.word(), "A");
    }

    #[test]
    fn test_sustained_hold_commits_once_per_interval() {
        let mut c = composer();
        c.update_prediction(Some('L'), 0.95, ms(0));

        let mut commits = Vec::new();
        for step in 0..=90u64 {
            let now = ms(step * 50);
            if let Some(letter) = c.try_add_letter(now) {
                commits.push((now, letter));
            }
        }

        // 0..=4.5s of hold: commits at 1.5, 3.0 and 4.5
        assert_eq!(
            commits,
            vec![(ms(1500), 'L'), (ms(3000), 'L'), (ms(4500), 'L')]
        );
        assert_eq!(c.word(), "LLL");
    }

    #[test]
    fn test_new_letter_needs_full_dwell_even_after_commit() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(0));
        assert_eq!(c.try_add_letter(ms(1500)), Some('A'));

        c.update_prediction(Some('B'), 0.9, ms(2000));
        assert_eq!(c.try_add_letter(ms(3000)), None);
        assert_eq!(c.try_add_letter(ms(3499)), None);
        assert_eq!(c.try_add_letter(ms(3500)), Some('B'));
        assert_eq!(c.word(), "AB");
    }

    #[test]
    fn test_time_until_next_add() {
        let mut c = composer();
        assert_eq!(c.time_until_next_add(ms(0)), Duration::from_millis(1500));
        assert_eq!(c.time_until_next_add(ms(1000)), Duration::from_millis(500));
        assert_eq!(c.time_until_next_add(ms(5000)), Duration::ZERO);

        c.update_prediction(Some('A'), 0.9, ms(3000));
        assert_eq!(c.try_add_letter(ms(4500)), Some('A'));
        assert_eq!(c.time_until_next_add(ms(4600)), Duration::from_millis(1400));
    }

    #[test]
    fn test_add_space_ignores_debounce() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(0));
        c.add_space();
        c.add_space();
        assert_eq!(c.word(), "  ");
    }

    #[test]
    fn test_delete_last_character() {
        let mut c = composer();
        assert_eq!(c.delete_last_character(), None);
        assert_eq!(c.word(), "");

        c.update_prediction(Some('H'), 0.9, ms(0));
        c.try_add_letter(ms(1500));
        c.add_space();
        assert_eq!(c.delete_last_character(), Some(' '));
        assert_eq!(c.delete_last_character(), Some('H'));
        assert_eq!(c.delete_last_character(), None);
    }

    #[test]
    fn test_delete_handles_multibyte() {
        let mut c = composer();
        c.update_prediction(Some('Ñ'), 0.9, ms(0));
        c.try_add_letter(ms(1500));
        assert_eq!(c.word(), "Ñ");
        assert_eq!(c.delete_last_character(), Some('Ñ'));
        assert_eq!(c.word(), "");
    }

    #[test]
    fn test_clear_returns_previous_word_and_keeps_hold() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(0));
        c.try_add_letter(ms(1500));
        c.add_space();

        assert_eq!(c.clear_word(), "A ");
        assert_eq!(c.word(), "");
        assert_eq!(c.stable_letter(), Some('A'));
        assert_eq!(c.stable_since(), ms(0));
        assert_eq!(c.clear_word(), "");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut c = composer();
        c.update_prediction(Some('A'), 0.9, ms(0));
        c.try_add_letter(ms(1500));

        c.reset(ms(2000));
        let snap = c.snapshot(ms(2000));
        assert_eq!(snap.composed_word, "");
        assert_eq!(snap.current_letter, None);
        assert_eq!(snap.current_confidence, 0.0);
        assert_eq!(snap.time_until_next_add, Duration::from_millis(1500));
        assert_eq!(c.stable_letter(), None);
        assert!(!c.should_predict(ms(2100)));
        assert!(c.should_predict(ms(2500)));

        c.reset(ms(3000));
        c.reset(ms(3000));
        assert_eq!(c.word(), "");
    }
}
