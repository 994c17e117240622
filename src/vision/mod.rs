//! Vision collaborators: frame decoding, hand detection, gesture classification
//!
//! The composer never sees pixels. This module owns the seams the service
//! calls before handing a (letter, confidence) pair to the composer:
//!
//! - **Frame**: base64 payload from the client, sniffed for a still-image format
//! - **HandDetector**: finds hand landmarks in a frame
//! - **Feature extraction**: wrist-relative, scale-normalized landmark vector
//! - **GestureClassifier**: maps features to a class index and confidence
//! - **ClassLabels**: class index -> character table
//!
//! Real detector/classifier models plug in behind the traits. The built-in
//! backends are `none` (never sees a hand) and `scripted` (synthetic hands and
//! a fixed list of scores, for demos and tests).

mod features;
mod frame;
mod labels;
mod scripted;
mod stub;

pub use features::{FEATURE_LEN, extract_hand_features};
pub use frame::{Frame, ImageFormat};
pub use labels::{ClassLabels, LabelError};
pub use scripted::{ScriptedClassifier, ScriptedDetector};
pub use stub::{NoHandDetector, NullClassifier};

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ClassifierSettings, DetectorSettings, VisionConfig};
use crate::stats::{SharedStats, StatKind, Timer};

/// Landmarks per detected hand
pub const HAND_LANDMARKS: usize = 21;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VisionError {
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("hand detection failed: {0}")]
    Detection(String),

    #[error("classification failed: {0}")]
    Classification(String),
}

/// Normalized landmark coordinate as produced by a hand tracker
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// One detected hand and the detector's confidence that it is a hand
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub landmarks: Vec<Landmark>,
    pub score: f32,
}

impl Hand {
    pub fn new(landmarks: Vec<Landmark>, score: f32) -> Self {
        Self { landmarks, score }
    }
}

/// Result of running the detector on one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    pub hands: Vec<Hand>,
}

impl Detection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn hand_count(&self) -> usize {
        self.hands.len()
    }

    /// Drop hands scored below `min_score` and keep at most `max_hands`
    pub fn filtered(mut self, min_score: f32, max_hands: usize) -> Self {
        self.hands.retain(|h| h.score >= min_score);
        self.hands.truncate(max_hands);
        self
    }
}

/// Raw classifier output before the label table is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    pub class: usize,
    pub confidence: f32,
}

/// Classifier output mapped to a character
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub letter: Option<char>,
    pub confidence: f32,
}

pub trait HandDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Detection, VisionError>;
}

pub trait GestureClassifier: Send + Sync {
    fn classify(&self, features: &[f32]) -> Result<ClassScore, VisionError>;
}

/// Detector + classifier + label table, constructed once at startup
pub struct Vision {
    detector: Box<dyn HandDetector>,
    classifier: Box<dyn GestureClassifier>,
    labels: ClassLabels,
    settings: DetectorSettings,
    stats: Option<SharedStats>,
}

impl Vision {
    pub fn new(
        detector: Box<dyn HandDetector>,
        classifier: Box<dyn GestureClassifier>,
        labels: ClassLabels,
    ) -> Self {
        Self {
            detector,
            classifier,
            labels,
            settings: DetectorSettings::default(),
            stats: None,
        }
    }

    pub fn with_detector_settings(mut self, settings: DetectorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_stats(mut self, stats: SharedStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Build the configured backend
    pub fn from_config(
        vision: &VisionConfig,
        detector: &DetectorSettings,
        classifier: &ClassifierSettings,
    ) -> anyhow::Result<Self> {
        let labels = ClassLabels::from_strings(&classifier.labels)?;

        let built = match vision {
            VisionConfig::Disabled => Vision::new(
                Box::new(NoHandDetector),
                Box::new(NullClassifier),
                labels,
            ),
            VisionConfig::Scripted {
                hands,
                hand_score,
                scores,
            } => {
                let scores = scores
                    .iter()
                    .map(|s| ClassScore {
                        class: s.class,
                        confidence: s.confidence,
                    })
                    .collect();
                Vision::new(
                    Box::new(ScriptedDetector::with_hands(*hands).scored(*hand_score)),
                    Box::new(ScriptedClassifier::new(scores)),
                    labels,
                )
            }
        };

        Ok(built.with_detector_settings(*detector))
    }

    #[hotpath::measure]
    pub fn detect(&self, frame: &Frame) -> Result<Detection, VisionError> {
        let timer = self
            .stats
            .as_ref()
            .map(|s| Timer::new(s, StatKind::Detection, frame.len()));
        let detection = self
            .detector
            .detect(frame)?
            .filtered(self.settings.min_detection_confidence, self.settings.max_hands);
        if let Some(t) = timer {
            t.finish(detection.hand_count());
        }
        Ok(detection)
    }

    #[hotpath::measure]
    pub fn classify(&self, features: &[f32]) -> Result<Prediction, VisionError> {
        let timer = self
            .stats
            .as_ref()
            .map(|s| Timer::new(s, StatKind::Classification, features.len()));
        let score = self.classifier.classify(features)?;
        if let Some(t) = timer {
            t.finish(1);
        }
        Ok(Prediction {
            letter: self.labels.letter_for(score.class),
            confidence: score.confidence,
        })
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }
}

/// Shared handle used by request handlers
pub type SharedVision = Arc<Vision>;
