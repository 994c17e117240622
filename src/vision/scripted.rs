//! Deterministic collaborators for demos and end-to-end tests

use std::sync::Mutex;

use super::{
    ClassScore, Detection, Frame, GestureClassifier, HAND_LANDMARKS, Hand, HandDetector,
    Landmark, VisionError,
};

/// Reports a fixed number of synthetic open-palm hands for every frame
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    hands: usize,
    score: f32,
}

impl ScriptedDetector {
    pub fn with_hands(hands: usize) -> Self {
        Self { hands, score: 0.9 }
    }

    /// Detection score reported for every synthetic hand
    pub fn scored(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    fn synthetic_hand(index: usize) -> Vec<Landmark> {
        let shift = index as f32 * 0.3;
        (0..HAND_LANDMARKS)
            .map(|i| {
                let finger = (i.saturating_sub(1) / 4) as f32;
                let joint = (i.saturating_sub(1) % 4) as f32;
                Landmark::new(0.3 + shift + finger * 0.04, 0.8 - joint * 0.05, 0.0)
            })
            .collect()
    }
}

impl HandDetector for ScriptedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Detection, VisionError> {
        Ok(Detection {
            hands: (0..self.hands)
                .map(|i| Hand::new(Self::synthetic_hand(i), self.score))
                .collect(),
        })
    }
}

/// Returns queued scores in order, wrapping around at the end
///
/// An empty script behaves like a classifier that is never confident.
#[derive(Debug)]
pub struct ScriptedClassifier {
    scores: Vec<ClassScore>,
    cursor: Mutex<usize>,
}

impl ScriptedClassifier {
    pub fn new(scores: Vec<ClassScore>) -> Self {
        Self {
            scores,
            cursor: Mutex::new(0),
        }
    }
}

impl GestureClassifier for ScriptedClassifier {
    fn classify(&self, _features: &[f32]) -> Result<ClassScore, VisionError> {
        if self.scores.is_empty() {
            return Ok(ClassScore {
                class: 0,
                confidence: 0.0,
            });
        }

        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| VisionError::Classification("script cursor poisoned".into()))?;
        let score = self.scores[*cursor % self.scores.len()];
        *cursor = (*cursor + 1) % self.scores.len();
        Ok(score)
    }
}
