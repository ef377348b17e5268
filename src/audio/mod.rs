//! Audio helpers: PCM16 wire format, RMS, WAV loading and noise mixing

pub mod mix;

use std::path::Path;

pub use mix::{EPSILON, mix};

use crate::{Error, Result};

/// Sample rate of the deployed model (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// A clean, labelled recording used by the evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: String,
    pub ground_truth_label: String,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Background noise overlaid onto utterances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Result of mixing one utterance with noise at one SNR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedSample {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl MixedSample {
    /// Raw little-endian PCM16 bytes, as a client would stream them
    #[must_use]
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        samples_to_pcm(&self.samples)
    }
}

/// Reassembles PCM16 samples from byte chunks with arbitrary boundaries
///
/// A trailing odd byte is held back and joined with the next chunk.
#[derive(Debug, Default)]
pub struct PcmDecoder {
    pending: Option<u8>,
}

impl PcmDecoder {
    /// Decode as many whole samples as `bytes` (plus any carried byte) holds
    pub fn push(&mut self, bytes: &[u8]) -> Vec<i16> {
        let mut samples = Vec::with_capacity(bytes.len() / 2 + 1);
        let mut rest = bytes;

        if let Some(low) = self.pending.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    samples.push(i16::from_le_bytes([low, high]));
                    rest = tail;
                }
                None => {
                    self.pending = Some(low);
                    return samples;
                }
            }
        }

        let mut chunks = rest.chunks_exact(2);
        samples.extend(chunks.by_ref().map(|c| i16::from_le_bytes([c[0], c[1]])));
        self.pending = chunks.remainder().first().copied();

        samples
    }

    /// Forget any carried byte
    pub const fn clear(&mut self) {
        self.pending = None;
    }
}

/// Encode samples as little-endian PCM16
#[must_use]
pub fn samples_to_pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Root-mean-square amplitude of PCM16 samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Read a WAV file as mono PCM16
///
/// Multi-channel audio is down-mixed by averaging channels; other bit depths
/// and float samples are rescaled to 16-bit.
///
/// # Errors
///
/// Returns error if the file cannot be opened or decoded
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<i32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = i32::from(spec.bits_per_sample) - 16;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| if shift >= 0 { v >> shift } else { v << -shift }))
                .collect::<std::result::Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(float_to_i32))
            .collect::<std::result::Result<_, _>>()?,
    };

    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(Error::Audio(format!("{} has no channels", path.display())));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let samples = interleaved
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().sum();
            (sum / frame.len() as i32).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
        })
        .collect();

    tracing::trace!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "wav loaded"
    );

    Ok((samples, spec.sample_rate))
}

/// Write mono PCM16 samples as a WAV file
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_i32(v: f32) -> i32 {
    (v * 32767.0).clamp(-32768.0, 32767.0) as i32
}
