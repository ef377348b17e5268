//! Offline noise-robustness evaluation
//!
//! Mixes every clean utterance of a labelled corpus with background noise at
//! a sequence of SNR levels, decodes each mixture with a scratch session and
//! reports per-level accuracy.

mod corpus;
mod report;

use std::sync::Arc;

use serde::Serialize;

pub use corpus::{label_from_stem, load_corpus, load_noise};
pub use report::{REPORT_HEADER, format_summary, report_file_name, write_report};

use crate::audio::{NoiseClip, Utterance, mix};
use crate::engine::EngineFactory;
use crate::grammar::CommandGrammar;
use crate::session::{ConnectionId, DecodeSession};
use crate::{Error, Result};

/// SNR levels swept when none are configured
pub const DEFAULT_SNR_STEPS: &[f64] = &[20.0, 15.0, 10.0, 5.0];

/// Accuracy at one SNR level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepResult {
    pub snr_db: f64,
    pub correct: usize,
    pub total: usize,
    /// Percentage rounded to one decimal; `NaN` when `total` is zero
    pub accuracy_pct: f64,
}

impl SweepResult {
    fn new(snr_db: f64, correct: usize, total: usize) -> Self {
        Self {
            snr_db,
            correct,
            total,
            accuracy_pct: accuracy_pct(correct, total),
        }
    }
}

/// `round(100 * correct / total, 1)`, or `NaN` for an empty level
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn accuracy_pct(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return f64::NAN;
    }
    (1000.0 * correct as f64 / total as f64).round() / 10.0
}

/// Canonical form for comparing transcripts with labels
///
/// Lowercases, maps underscores to spaces and collapses whitespace.
#[must_use]
pub fn normalize_transcript(text: &str) -> String {
    text.to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs accuracy sweeps with a scratch decode session
pub struct SweepDriver {
    factory: Arc<dyn EngineFactory>,
    grammar: Arc<CommandGrammar>,
    sample_rate: u32,
}

impl SweepDriver {
    /// Create a driver whose scratch sessions use `factory` and `grammar`
    #[must_use]
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        grammar: Arc<CommandGrammar>,
        sample_rate: u32,
    ) -> Self {
        Self {
            factory,
            grammar,
            sample_rate,
        }
    }

    /// Sweep `corpus` × `snr_levels`, each utterance decoded `repetitions` times
    ///
    /// Results come back in the order of `snr_levels`. A failing decode is
    /// scored incorrect and the scratch session is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `repetitions` is zero, sample rates do not
    /// match, or the evaluation engine cannot be constructed
    pub fn run(
        &self,
        corpus: &[Utterance],
        noise: &NoiseClip,
        snr_levels: &[f64],
        repetitions: usize,
    ) -> Result<Vec<SweepResult>> {
        if repetitions == 0 {
            return Err(Error::Config("repetitions must be at least 1".to_string()));
        }
        self.check_sample_rates(corpus, noise)?;

        let mut session = self.scratch_session()?;
        let mut results = Vec::with_capacity(snr_levels.len());

        for &snr_db in snr_levels {
            let mut correct = 0;
            let mut total = 0;

            for utterance in corpus {
                for _ in 0..repetitions {
                    let mixed = mix(utterance, noise, snr_db);

                    let prediction = match session.decode_utterance(&mixed.to_pcm_bytes()) {
                        Ok(text) => Some(text),
                        Err(e) => {
                            tracing::warn!(
                                utterance = %utterance.id,
                                snr_db,
                                error = %e,
                                "decode failed, scoring as incorrect"
                            );
                            session = self.scratch_session()?;
                            None
                        }
                    };

                    let hit = prediction.is_some_and(|p| {
                        self.is_correct(&p, &utterance.ground_truth_label)
                    });

                    tracing::debug!(
                        utterance = %utterance.id,
                        snr_db,
                        hit,
                        "utterance scored"
                    );

                    if hit {
                        correct += 1;
                    }
                    total += 1;
                }
            }

            let result = SweepResult::new(snr_db, correct, total);
            tracing::info!("{}", format_summary(&result));
            results.push(result);
        }

        Ok(results)
    }

    /// Whether a predicted transcript matches the ground-truth label
    ///
    /// An empty prediction counts as the sentinel, so it is only correct
    /// when the label is the sentinel itself.
    #[must_use]
    pub fn is_correct(&self, predicted: &str, label: &str) -> bool {
        let mut predicted = normalize_transcript(predicted);
        if predicted.is_empty() {
            predicted = normalize_transcript(self.grammar.sentinel());
        }
        predicted == normalize_transcript(label)
    }

    fn scratch_session(&self) -> Result<DecodeSession> {
        let engine = self
            .factory
            .create(&self.grammar, self.sample_rate)
            .map_err(|e| Error::Config(format!("evaluation engine: {e}")))?;
        Ok(DecodeSession::new(
            ConnectionId::new(),
            Arc::clone(&self.grammar),
            engine,
        ))
    }

    fn check_sample_rates(&self, corpus: &[Utterance], noise: &NoiseClip) -> Result<()> {
        if noise.sample_rate != self.sample_rate {
            return Err(Error::Config(format!(
                "noise clip is {} Hz, expected {} Hz",
                noise.sample_rate, self.sample_rate
            )));
        }
        if let Some(u) = corpus.iter().find(|u| u.sample_rate != self.sample_rate) {
            return Err(Error::Config(format!(
                "utterance {} is {} Hz, expected {} Hz",
                u.id, u.sample_rate, self.sample_rate
            )));
        }
        Ok(())
    }
}
