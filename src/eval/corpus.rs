//! Evaluation corpus loading

use std::path::Path;

use crate::audio::{NoiseClip, Utterance, read_wav};
use crate::{Error, Result};

/// Ground-truth label encoded in a corpus file stem (`random_question` → `random question`)
#[must_use]
pub fn label_from_stem(stem: &str) -> String {
    stem.replace('_', " ")
}

/// Load every `*.wav` file in `dir` as a labelled utterance
///
/// Files are ordered by name so sweeps are reproducible.
///
/// # Errors
///
/// Returns error if the directory cannot be read, a file cannot be decoded,
/// or a file's sample rate differs from `sample_rate`
pub fn load_corpus(dir: &Path, sample_rate: u32) -> Result<Vec<Utterance>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .collect();
    paths.sort();

    let mut corpus = Vec::with_capacity(paths.len());
    for path in paths {
        let (samples, rate) = read_wav(&path)?;
        if rate != sample_rate {
            return Err(Error::Config(format!(
                "{} is {rate} Hz, expected {sample_rate} Hz",
                path.display()
            )));
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        corpus.push(Utterance {
            id,
            ground_truth_label: label_from_stem(&stem),
            samples,
            sample_rate: rate,
        });
    }

    if corpus.is_empty() {
        tracing::warn!(dir = %dir.display(), "evaluation corpus is empty");
    } else {
        tracing::info!(dir = %dir.display(), utterances = corpus.len(), "evaluation corpus loaded");
    }

    Ok(corpus)
}

/// Load the background noise clip
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn load_noise(path: &Path) -> Result<NoiseClip> {
    let (samples, sample_rate) = read_wav(path)?;
    tracing::info!(
        path = %path.display(),
        samples = samples.len(),
        sample_rate,
        "noise clip loaded"
    );
    Ok(NoiseClip {
        samples,
        sample_rate,
    })
}
