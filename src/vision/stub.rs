//! Placeholder collaborators for running without a model

use super::{ClassScore, Detection, Frame, GestureClassifier, HandDetector, VisionError};

/// Never finds a hand
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandDetector;

impl HandDetector for NoHandDetector {
    fn detect(&self, _frame: &Frame) -> Result<Detection, VisionError> {
        Ok(Detection::none())
    }
}

/// Paired with [`NoHandDetector`]; unreachable in practice since there are
/// never features to classify
#[derive(Debug, Default, Clone, Copy)]
pub struct NullClassifier;

impl GestureClassifier for NullClassifier {
    fn classify(&self, _features: &[f32]) -> Result<ClassScore, VisionError> {
        Err(VisionError::Classification(
            "no classifier model configured".into(),
        ))
    }
}
