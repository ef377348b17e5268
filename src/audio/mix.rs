//! SNR-targeted noise mixing
//!
//! Noise is tiled deterministically from offset zero, so a sweep run twice
//! over the same corpus produces bit-identical mixtures.

use super::{MixedSample, NoiseClip, Utterance, rms};

/// Guard added to the noise power term so near-silent noise cannot divide by zero
pub const EPSILON: f64 = 1e-9;

/// Overlay `noise` onto `clean` so that the mixture has roughly `snr_db`
/// signal-to-noise ratio
///
/// The output always has exactly the clean utterance's length and sample
/// rate. Sums saturate at the PCM16 range.
///
/// # Panics
///
/// Panics if the utterance and noise sample rates differ; callers must
/// resample before mixing.
#[must_use]
pub fn mix(clean: &Utterance, noise: &NoiseClip, snr_db: f64) -> MixedSample {
    assert_eq!(
        clean.sample_rate, noise.sample_rate,
        "clean utterance and noise clip must share a sample rate"
    );

    let tiled = tile(&noise.samples, clean.samples.len());
    if tiled.is_empty() {
        return MixedSample {
            samples: clean.samples.clone(),
            sample_rate: clean.sample_rate,
        };
    }

    let gain = linear_gain(rms(&clean.samples), rms(&tiled), snr_db);

    #[allow(clippy::cast_possible_truncation)]
    let samples = clean
        .samples
        .iter()
        .zip(&tiled)
        .map(|(&c, &n)| {
            let mixed = f64::from(n).mul_add(gain, f64::from(c));
            mixed.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
        })
        .collect();

    MixedSample {
        samples,
        sample_rate: clean.sample_rate,
    }
}

/// Repeat `noise` from offset zero until it covers `len` samples, then truncate
fn tile(noise: &[i16], len: usize) -> Vec<i16> {
    if noise.is_empty() {
        return Vec::new();
    }
    noise.iter().copied().cycle().take(len).collect()
}

/// Amplitude factor applied to the tiled noise
fn linear_gain(clean_rms: f64, noise_rms: f64, snr_db: f64) -> f64 {
    let g = clean_rms / 10f64.powf(snr_db / 20.0).mul_add(noise_rms, EPSILON);
    // inf * 0 (infinite SNR over silent noise) is NaN
    if !g.is_finite() || g <= 0.0 {
        return 0.0;
    }
    let gain_db = 20.0 * g.log10();
    10f64.powf(gain_db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SAMPLE_RATE;

    fn utterance(samples: Vec<i16>) -> Utterance {
        Utterance {
            id: "u".to_string(),
            ground_truth_label: "left".to_string(),
            samples,
            sample_rate: SAMPLE_RATE,
        }
    }

    fn noise(samples: Vec<i16>) -> NoiseClip {
        NoiseClip {
            samples,
            sample_rate: SAMPLE_RATE,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn sine(len: usize, amplitude: f64) -> Vec<i16> {
        (0..len)
            .map(|i| (amplitude * (i as f64 * 0.05).sin()) as i16)
            .collect()
    }

    fn noise_contribution(mixed: &MixedSample, clean: &Utterance) -> f64 {
        let diff: Vec<i16> = mixed
            .samples
            .iter()
            .zip(&clean.samples)
            .map(|(m, c)| m.saturating_sub(*c))
            .collect();
        rms(&diff)
    }

    #[test]
    fn output_length_matches_clean() {
        let clean = utterance(sine(1000, 8000.0));
        for noise_len in [7, 1000, 5000] {
            let mixed = mix(&clean, &noise(sine(noise_len, 3000.0)), 10.0);
            assert_eq!(mixed.samples.len(), clean.samples.len());
            assert_eq!(mixed.sample_rate, clean.sample_rate);
        }
    }

    #[test]
    fn tiling_is_deterministic_from_offset_zero() {
        assert_eq!(tile(&[1, 2, 3], 7), vec![1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(tile(&[1, 2, 3], 2), vec![1, 2]);
        assert!(tile(&[], 4).is_empty());

        let clean = utterance(sine(500, 8000.0));
        let n = noise(sine(33, 2000.0));
        assert_eq!(mix(&clean, &n, 5.0), mix(&clean, &n, 5.0));
    }

    #[test]
    fn achieves_target_snr() {
        let clean = utterance(sine(16000, 6000.0));
        let n = noise(vec![1000, -1000, 500, -500, 1500, -1500]);

        let mixed = mix(&clean, &n, 10.0);
        let measured = 20.0 * (rms(&clean.samples) / noise_contribution(&mixed, &clean)).log10();
        assert!((measured - 10.0).abs() < 0.1, "measured SNR {measured}");
    }

    #[test]
    fn high_snr_converges_to_clean() {
        let clean = utterance(sine(2000, 8000.0));
        let mixed = mix(&clean, &noise(sine(300, 9000.0)), 120.0);
        assert_eq!(mixed.samples, clean.samples);
    }

    #[test]
    fn lower_snr_adds_more_noise() {
        let clean = utterance(sine(4000, 4000.0));
        let n = noise(vec![700, -300, 200, -900, 400]);

        let contributions: Vec<f64> = [20.0, 15.0, 10.0, 5.0, 0.0]
            .iter()
            .map(|&snr| noise_contribution(&mix(&clean, &n, snr), &clean))
            .collect();

        for pair in contributions.windows(2) {
            assert!(pair[1] > pair[0], "{contributions:?}");
        }
    }

    #[test]
    fn silent_noise_is_guarded() {
        let clean = utterance(sine(100, 5000.0));
        let mixed = mix(&clean, &noise(vec![0; 10]), 10.0);
        assert_eq!(mixed.samples, clean.samples);
    }

    #[test]
    fn infinite_snr_returns_clean() {
        let clean = utterance(vec![1000, -1000, 500]);

        let mixed = mix(&clean, &noise(vec![0; 4]), f64::INFINITY);
        assert_eq!(mixed.samples, clean.samples);

        let mixed = mix(&clean, &noise(vec![3000, -3000, 1500]), f64::INFINITY);
        assert_eq!(mixed.samples, clean.samples);
    }

    #[test]
    fn empty_inputs() {
        let clean = utterance(Vec::new());
        assert!(mix(&clean, &noise(vec![1, 2, 3]), 10.0).samples.is_empty());

        let clean = utterance(sine(50, 5000.0));
        assert_eq!(mix(&clean, &noise(Vec::new()), 10.0).samples, clean.samples);
    }

    #[test]
    #[should_panic(expected = "sample rate")]
    fn mismatched_sample_rates_panic() {
        let clean = utterance(sine(10, 100.0));
        let n = NoiseClip {
            samples: vec![1, 2],
            sample_rate: 8000,
        };
        let _ = mix(&clean, &n, 10.0);
    }
}
