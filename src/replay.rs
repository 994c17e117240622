//! Offline replay of recorded classifier output
//!
//! A recording is JSON lines, one sample per frame:
//!
//! ```text
//! {"t": 0.0, "letter": "A", "confidence": 0.91}
//! {"t": 0.1, "letter": null, "confidence": 0.0}
//! ```
//!
//! Samples are fed through a composer driven by a [`ManualClock`] exactly as
//! the live service would: gate first, then ingest, then try to commit.

use std::fmt;
use std::io::BufRead;

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::clock::{Clock, ManualClock, Timestamp};
use crate::composer::{ComposerConfig, WordComposer};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplaySample {
    /// Seconds since the start of the recording
    pub t: f64,
    #[serde(default)]
    pub letter: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

impl ReplaySample {
    fn letter(&self) -> Option<char> {
        self.letter.as_deref().and_then(|s| s.chars().next())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub commits: Vec<(Timestamp, char)>,
    pub word: String,
    /// Samples that passed the prediction gate
    pub ingested: usize,
    pub total: usize,
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (at, letter) in &self.commits {
            writeln!(f, "{:>10}  + {:?}", at.to_string(), letter)?;
        }
        writeln!(
            f,
            "{} of {} samples ingested, {} commits",
            self.ingested,
            self.total,
            self.commits.len()
        )?;
        write!(f, "word: {:?}", self.word)
    }
}

/// Parse a JSON-lines recording; blank lines are skipped. Timestamps must be
/// non-negative and must not go backwards.
pub fn parse_recording(reader: impl BufRead) -> anyhow::Result<Vec<ReplaySample>> {
    let mut samples: Vec<ReplaySample> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: ReplaySample = serde_json::from_str(line)
            .with_context(|| format!("parsing line {}", index + 1))?;
        if let Some(letter) = &sample.letter {
            if letter.chars().count() > 1 {
                bail!("line {}: letter {:?} is more than one character", index + 1, letter);
            }
        }
        if !sample.t.is_finite() || sample.t < 0.0 {
            bail!("line {}: t = {} is not a non-negative time", index + 1, sample.t);
        }
        if let Some(previous) = samples.last() {
            if sample.t < previous.t {
                bail!(
                    "line {}: t = {} goes back in time (previous t = {})",
                    index + 1,
                    sample.t,
                    previous.t
                );
            }
        }
        samples.push(sample);
    }
    Ok(samples)
}

pub fn replay(config: ComposerConfig, samples: &[ReplaySample]) -> ReplayReport {
    let clock = ManualClock::new();
    let mut composer = WordComposer::new(config, clock.now());
    let mut commits = Vec::new();
    let mut ingested = 0;

    for sample in samples {
        clock.set(Timestamp::from_secs_f64(sample.t));
        let now = clock.now();

        if composer.should_predict(now) {
            composer.update_prediction(sample.letter(), sample.confidence, now);
            ingested += 1;
        } else {
            trace!(at = %now, "sample gated");
        }

        if let Some(letter) = composer.try_add_letter(now) {
            commits.push((now, letter));
        }
    }

    debug!(ingested, total = samples.len(), "replay finished");
    ReplayReport {
        commits,
        word: composer.word().to_string(),
        ingested,
        total: samples.len(),
    }
}
