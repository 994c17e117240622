//! Request and response bodies

use serde::{Deserialize, Serialize};

use super::pipeline::PredictOutcome;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Base64 image, optionally as a `data:` URL
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub success: bool,
    pub current_letter: String,
    pub confidence: f64,
    pub hand_count: usize,
    pub current_word: String,
    pub time_until_next_add: f64,
    pub letter_added: Option<String>,
    pub message: Option<String>,
}

impl From<PredictOutcome> for PredictResponse {
    fn from(outcome: PredictOutcome) -> Self {
        let snap = outcome.snapshot;
        Self {
            success: true,
            current_letter: snap.current_letter.map(String::from).unwrap_or_default(),
            confidence: round_to(f64::from(snap.current_confidence), 3),
            hand_count: outcome.hand_count,
            current_word: snap.composed_word,
            time_until_next_add: round_to(snap.time_until_next_add.as_secs_f64(), 1),
            letter_added: outcome.letter_added.map(String::from),
            message: Some("Prediction successful".into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WordResponse {
    pub success: bool,
    pub current_word: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ClearResponse {
    pub success: bool,
    pub previous_word: String,
    pub current_word: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResetResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionEndResponse {
    pub success: bool,
    pub ended: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
