use tracing::trace;

use crate::clock::Clock;
use crate::composer::ComposerSnapshot;
use crate::session::Session;
use crate::vision::{Frame, Vision, VisionError, extract_hand_features};

#[derive(Debug, Clone, PartialEq)]
pub struct PredictOutcome {
    pub snapshot: ComposerSnapshot,
    pub hand_count: usize,
    pub letter_added: Option<char>,
}

/// One frame through decode, detection and the session's composer.
///
/// Blocking: call from a blocking worker. Detection runs before the session
/// lock is taken; gate, classify, ingest, commit and snapshot run as one
/// critical section. A classifier error returns before anything is ingested.
#[hotpath::measure]
pub fn run_predict_cycle(
    vision: &Vision,
    session: &Session,
    clock: &dyn Clock,
    image: &str,
) -> Result<PredictOutcome, VisionError> {
    let frame = Frame::from_base64(image)?;
    let detection = vision.detect(&frame)?;
    let hand_count = detection.hand_count();
    let features = extract_hand_features(&detection);

    let mut composer = session.composer().blocking_lock();
    let now = clock.now();

    if composer.should_predict(now) {
        match features {
            Some(features) => {
                let prediction = vision.classify(&features)?;
                trace!(
                    session = %session.id(),
                    letter = ?prediction.letter,
                    confidence = prediction.confidence,
                    "classified frame"
                );
                composer.update_prediction(prediction.letter, prediction.confidence, now);
            }
            None => composer.update_prediction(None, 0.0, now),
        }
    }

    let letter_added = composer.try_add_letter(now);
    Ok(PredictOutcome {
        snapshot: composer.snapshot(now),
        hand_count,
        letter_added,
    })
}
