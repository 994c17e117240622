use super::{Detection, HAND_LANDMARKS};

/// Length of the vector produced by [`extract_hand_features`]
pub const FEATURE_LEN: usize = HAND_LANDMARKS * 3;

/// Feature vector for the first hand in `detection`.
///
/// Landmarks are translated so the wrist (landmark 0) sits at the origin,
/// then divided by the largest absolute coordinate so hand size and distance
/// to the camera drop out. Returns `None` when no complete hand was found.
pub fn extract_hand_features(detection: &Detection) -> Option<Vec<f32>> {
    let hand = &detection.hands.first()?.landmarks;
    if hand.len() != HAND_LANDMARKS {
        return None;
    }

    let wrist = hand[0];
    let mut features = Vec::with_capacity(FEATURE_LEN);
    for lm in hand {
        features.push(lm.x - wrist.x);
        features.push(lm.y - wrist.y);
        features.push(lm.z - wrist.z);
    }

    let scale = features.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()));
    if scale > f32::EPSILON {
        for v in &mut features {
            *v /= scale;
        }
    }

    Some(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Hand, Landmark};

    fn landmarks(offset: f32, spread: f32) -> Vec<Landmark> {
        (0..HAND_LANDMARKS)
            .map(|i| {
                let i = i as f32;
                Landmark::new(offset + i * spread, offset - i * spread * 0.5, 0.0)
            })
            .collect()
    }

    fn hand(offset: f32, spread: f32) -> Hand {
        Hand::new(landmarks(offset, spread), 0.9)
    }

    #[test]
    fn test_no_hand() {
        assert_eq!(extract_hand_features(&Detection::none()), None);
    }

    #[test]
    fn test_incomplete_hand() {
        let detection = Detection {
            hands: vec![Hand::new(landmarks(0.1, 0.01)[..5].to_vec(), 0.9)],
        };
        assert_eq!(extract_hand_features(&detection), None);
    }

    #[test]
    fn test_wrist_relative_and_scaled() {
        let detection = Detection {
            hands: vec![hand(0.3, 0.02)],
        };
        let features = extract_hand_features(&detection).unwrap();
        assert_eq!(features.len(), FEATURE_LEN);
        assert_eq!(&features[0..3], &[0.0, 0.0, 0.0]);

        let max = features.iter().fold(0.0_f32, |a, v| a.max(v.abs()));
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_translation_and_scale_invariant() {
        let near = extract_hand_features(&Detection {
            hands: vec![hand(0.2, 0.04)],
        })
        .unwrap();
        let far = extract_hand_features(&Detection {
            hands: vec![hand(0.6, 0.01)],
        })
        .unwrap();
        for (a, b) in near.iter().zip(far.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_only_first_hand_used() {
        let first = hand(0.2, 0.04);
        let detection = Detection {
            hands: vec![first.clone(), hand(0.9, 0.001)],
        };
        let single = Detection { hands: vec![first] };
        assert_eq!(
            extract_hand_features(&detection),
            extract_hand_features(&single)
        );
    }
}
