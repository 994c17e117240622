//! Performance stats tracking for vision inference

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Samples kept per kind; older ones are dropped
const WINDOW: usize = 1024;

#[derive(Clone, Default)]
pub struct InferenceStats {
    pub detection: VecDeque<Sample>,
    pub classification: VecDeque<Sample>,
    pub detection_total: u64,
    pub classification_total: u64,
}

#[derive(Clone, Debug)]
pub struct Sample {
    pub duration: Duration,
    pub input_size: usize,  // frame bytes for detection, feature count for classification
    pub output_size: usize, // hands found for detection, 1 for classification
}

impl InferenceStats {
    pub fn record(&mut self, kind: &StatKind, sample: Sample) {
        let (window, total) = match kind {
            StatKind::Detection => (&mut self.detection, &mut self.detection_total),
            StatKind::Classification => {
                (&mut self.classification, &mut self.classification_total)
            }
        };
        if window.len() == WINDOW {
            window.pop_front();
        }
        window.push_back(sample);
        *total += 1;
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();

        if !self.detection.is_empty() {
            let (avg, min, max) = Self::calc(&self.detection);
            let with_hand = self.detection.iter().filter(|s| s.output_size > 0).count();
            out.push_str(&format!(
                "Detection (n={}, window={}): avg={:.1}ms min={:.1}ms max={:.1}ms hand-rate={:.0}%\n",
                self.detection_total,
                self.detection.len(),
                ms(avg),
                ms(min),
                ms(max),
                100.0 * with_hand as f64 / self.detection.len() as f64
            ));
        }

        if !self.classification.is_empty() {
            let (avg, min, max) = Self::calc(&self.classification);
            out.push_str(&format!(
                "Classification (n={}, window={}): avg={:.1}ms min={:.1}ms max={:.1}ms\n",
                self.classification_total,
                self.classification.len(),
                ms(avg),
                ms(min),
                ms(max)
            ));
        }

        if out.is_empty() {
            out.push_str("No stats recorded yet.\n");
        }
        out
    }

    fn calc(samples: &VecDeque<Sample>) -> (Duration, Duration, Duration) {
        let total: Duration = samples.iter().map(|s| s.duration).sum();
        let avg = total / samples.len() as u32;
        let min = samples.iter().map(|s| s.duration).min().unwrap_or_default();
        let max = samples.iter().map(|s| s.duration).max().unwrap_or_default();
        (avg, min, max)
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

pub type SharedStats = Arc<Mutex<InferenceStats>>;

pub fn new_shared() -> SharedStats {
    Arc::new(Mutex::new(InferenceStats::default()))
}

/// Timer helper that records when finished
pub struct Timer<'a> {
    start: Instant,
    stats: &'a SharedStats,
    kind: StatKind,
    input_size: usize,
}

pub enum StatKind {
    Detection,
    Classification,
}

impl<'a> Timer<'a> {
    pub fn new(stats: &'a SharedStats, kind: StatKind, input_size: usize) -> Self {
        Self {
            start: Instant::now(),
            stats,
            kind,
            input_size,
        }
    }

    pub fn finish(self, output_size: usize) {
        let sample = Sample {
            duration: self.start.elapsed(),
            input_size: self.input_size,
            output_size,
        };
        // A poisoned lock only means another recorder panicked mid-push
        let mut stats = match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.record(&self.kind, sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(millis: u64, output_size: usize) -> Sample {
        Sample {
            duration: Duration::from_millis(millis),
            input_size: 0,
            output_size,
        }
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(InferenceStats::default().summary(), "No stats recorded yet.\n");
    }

    #[test]
    fn test_summary_reports_both_kinds() {
        let mut stats = InferenceStats::default();
        stats.record(&StatKind::Detection, sample(10, 1));
        stats.record(&StatKind::Detection, sample(30, 0));
        stats.record(&StatKind::Classification, sample(4, 1));

        let summary = stats.summary();
        assert!(summary.contains("Detection (n=2, window=2): avg=20.0ms"));
        assert!(summary.contains("hand-rate=50%"));
        assert!(summary.contains("Classification (n=1, window=1): avg=4.0ms"));
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = InferenceStats::default();
        for _ in 0..(WINDOW + 10) {
            stats.record(&StatKind::Classification, sample(1, 1));
        }
        assert_eq!(stats.classification.len(), WINDOW);
        assert_eq!(stats.classification_total, (WINDOW + 10) as u64);
    }

    #[test]
    fn test_timer_records_into_shared() {
        let shared = new_shared();
        Timer::new(&shared, StatKind::Detection, 128).finish(1);
        let stats = shared.lock().unwrap();
        assert_eq!(stats.detection.len(), 1);
        assert_eq!(stats.detection[0].input_size, 128);
    }
}
