//! Synthetic series for experiments, validation and tests.
//!
//! ## Available Generators
//!
//! - **Coupled narrowband pair**: two series sharing a band-limited Gaussian
//!   component with a fixed phase offset, plus independent noise
//! - **Tone pair**: phase-shifted sinusoids with optional noise
//! - **White-noise pair**: independent standard normal series
//! - **Binary events**: Bernoulli event series with optional periodic echoes
//!
//! Every generator takes an explicit seed; nothing draws from a global
//! generator.

use crate::errors::{validate_parameter, SurrogateResult, SurrogateTestError};
use crate::fft_ops::{irfft, rfft, rfft_frequencies};
use crate::math_utils::population_std;
use crate::secure_rng::SecureRng;
use num_complex::Complex64;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Length, seed and sample rate shared by all generators.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneratorConfig {
    /// Length of the generated series
    pub length: usize,
    /// Seed of the generator
    pub seed: u64,
    /// Sample rate in Hz
    pub sampling_frequency: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            length: 12288,
            seed: 0,
            sampling_frequency: 20.0,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> SurrogateResult<()> {
        if self.length < 2 {
            return Err(SurrogateTestError::InsufficientData {
                required: 2,
                actual: self.length,
            });
        }
        if !(self.sampling_frequency.is_finite() && self.sampling_frequency > 0.0) {
            return Err(SurrogateTestError::invalid(
                "sampling_frequency",
                self.sampling_frequency,
                "must be finite and > 0",
            ));
        }
        Ok(())
    }

    fn time(&self, i: usize) -> f64 {
        i as f64 / self.sampling_frequency
    }
}

/// Shape of the coupled narrowband scenario.
///
/// `x = s + a·sin(2π·f_d·t) + snr_x·ε_x` and `y = rot(s, φ) + snr_y·ε_y`,
/// where `s` is unit-variance Gaussian noise restricted to
/// `center_hz ± bandwidth_hz/2` and `rot` shifts the phase of every
/// component of `s` by `φ`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoupledPairConfig {
    /// Center of the shared component in Hz
    pub center_hz: f64,
    /// Width of the shared component in Hz
    pub bandwidth_hz: f64,
    /// Phase offset of `y`'s shared component in radians
    pub phase_offset: f64,
    /// Noise std added to `x`
    pub snr_x: f64,
    /// Noise std added to `y`
    pub snr_y: f64,
    /// Frequency of the out-of-band tone in `x`
    pub distractor_hz: f64,
    /// Amplitude of the out-of-band tone in `x`
    pub distractor_amplitude: f64,
}

impl Default for CoupledPairConfig {
    fn default() -> Self {
        Self {
            center_hz: 0.8,
            bandwidth_hz: 0.2,
            phase_offset: 0.6,
            snr_x: 0.05,
            snr_y: 0.30,
            distractor_hz: 2.0,
            distractor_amplitude: 0.5,
        }
    }
}

fn standard_normal_series(n: usize, rng: &mut SecureRng) -> Vec<f64> {
    (0..n).map(|_| rng.standard_normal()).collect()
}

/// Gaussian noise restricted to `[low, high]` Hz and scaled to unit variance,
/// plus a copy with every component phase-shifted by `phase_offset`.
fn narrowband_component(
    config: &GeneratorConfig,
    low: f64,
    high: f64,
    phase_offset: f64,
    rng: &mut SecureRng,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    let n = config.length;
    let white = standard_normal_series(n, rng);
    let frequencies = rfft_frequencies(n, config.sampling_frequency);

    let mut spectrum = rfft(&white)?;
    for (bin, &f) in spectrum.iter_mut().zip(&frequencies) {
        if f < low || f > high || f == 0.0 {
            *bin = Complex64::new(0.0, 0.0);
        }
    }
    let rotation = Complex64::from_polar(1.0, phase_offset);
    let rotated: Vec<Complex64> = spectrum.iter().map(|&c| c * rotation).collect();

    let mut shared = irfft(&spectrum, n)?;
    let mut shifted = irfft(&rotated, n)?;

    let scale = population_std(&shared);
    if scale <= 0.0 {
        return Err(SurrogateTestError::invalid(
            "bandwidth_hz",
            high - low,
            "must cover at least one frequency bin of the series",
        ));
    }
    shared.iter_mut().for_each(|v| *v /= scale);
    shifted.iter_mut().for_each(|v| *v /= scale);
    Ok((shared, shifted))
}

/// Two series coupled through a shared narrowband component.
pub fn coupled_narrowband_pair(
    config: &GeneratorConfig,
    coupling: &CoupledPairConfig,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    config.validate()?;
    if !(coupling.bandwidth_hz.is_finite() && coupling.bandwidth_hz > 0.0) {
        return Err(SurrogateTestError::invalid(
            "bandwidth_hz",
            coupling.bandwidth_hz,
            "must be finite and > 0",
        ));
    }
    validate_parameter(coupling.snr_x, 0.0, f64::MAX, "snr_x")?;
    validate_parameter(coupling.snr_y, 0.0, f64::MAX, "snr_y")?;

    let mut rng = SecureRng::with_seed(config.seed);
    let half = 0.5 * coupling.bandwidth_hz;
    let (shared, rotated) = narrowband_component(
        config,
        coupling.center_hz - half,
        coupling.center_hz + half,
        coupling.phase_offset,
        &mut rng,
    )?;

    let x = shared
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let t = config.time(i);
            s + coupling.distractor_amplitude * (2.0 * PI * coupling.distractor_hz * t).sin()
                + coupling.snr_x * rng.standard_normal()
        })
        .collect();
    let y = rotated
        .iter()
        .map(|&s| s + coupling.snr_y * rng.standard_normal())
        .collect();

    Ok((x, y))
}

/// Sinusoids at `frequency` Hz, `y` leading `x` by `phase` radians, each with
/// independent Gaussian noise of std `noise`.
pub fn tone_pair(
    config: &GeneratorConfig,
    frequency: f64,
    phase: f64,
    noise: f64,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    config.validate()?;
    validate_parameter(noise, 0.0, f64::MAX, "noise")?;

    let mut rng = SecureRng::with_seed(config.seed);
    let omega = 2.0 * PI * frequency;
    let mut x = Vec::with_capacity(config.length);
    let mut y = Vec::with_capacity(config.length);
    for i in 0..config.length {
        let t = config.time(i);
        x.push((omega * t).sin() + noise * rng.standard_normal());
        y.push((omega * t + phase).sin() + noise * rng.standard_normal());
    }
    Ok((x, y))
}

/// Two independent standard normal series.
pub fn white_noise_pair(config: &GeneratorConfig) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    config.validate()?;
    let mut rng = SecureRng::with_seed(config.seed);
    let x = standard_normal_series(config.length, &mut rng);
    let y = standard_normal_series(config.length, &mut rng);
    Ok((x, y))
}

/// Periodic echo added on top of a binary event series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EchoConfig {
    /// Period of the echo in samples
    pub every: usize,
    /// Samples affected by each echo
    pub width: usize,
    /// Value added to each affected sample before clipping
    pub amplitude: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            every: 250,
            width: 3,
            amplitude: 0.3,
        }
    }
}

/// Bernoulli(`rate`) event series, optionally with a periodic echo.
///
/// The echo adds `amplitude` to `width` samples starting at every positive
/// multiple of `every` and clips the result to `[0, 1]`. The base events do
/// not depend on whether an echo is requested.
pub fn binary_events(
    config: &GeneratorConfig,
    rate: f64,
    echo: Option<&EchoConfig>,
) -> SurrogateResult<Vec<f64>> {
    config.validate()?;
    validate_parameter(rate, 0.0, 1.0, "rate")?;

    let mut rng = SecureRng::with_seed(config.seed);
    let mut events: Vec<f64> = (0..config.length)
        .map(|_| if rng.bool(rate) { 1.0 } else { 0.0 })
        .collect();

    if let Some(echo) = echo {
        if echo.every == 0 || echo.width == 0 {
            return Err(SurrogateTestError::invalid(
                "echo",
                0.0,
                "every and width must be positive",
            ));
        }
        if !echo.amplitude.is_finite() {
            return Err(SurrogateTestError::invalid(
                "echo_amplitude",
                echo.amplitude,
                "must be finite",
            ));
        }
        let n = events.len();
        for start in (echo.every..n).step_by(echo.every) {
            for v in &mut events[start..(start + echo.width).min(n)] {
                *v += echo.amplitude;
            }
        }
        events.iter_mut().for_each(|v| *v = v.clamp(0.0, 1.0));
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{band_coherence, FrequencyBand, ReductionMode};
    use crate::math_utils::mean;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_coupled_pair_is_coherent_in_band_only() {
        let config = GeneratorConfig::default();
        let (x, y) = coupled_narrowband_pair(&config, &CoupledPairConfig::default()).unwrap();
        assert_eq!(x.len(), 12288);
        assert_eq!(y.len(), 12288);

        let in_band = FrequencyBand::new(0.72, 0.88).unwrap();
        let out_band = FrequencyBand::new(3.0, 4.0).unwrap();
        let inside = band_coherence(&x, &y, 20.0, 2048, &in_band, ReductionMode::Mean).unwrap();
        let outside = band_coherence(&x, &y, 20.0, 2048, &out_band, ReductionMode::Mean).unwrap();
        assert!(inside.value > 0.8, "in-band coherence {}", inside.value);
        assert!(outside.value < 0.3, "out-of-band coherence {}", outside.value);
    }

    #[test]
    fn test_coupled_pair_is_reproducible() {
        let config = GeneratorConfig {
            length: 2000,
            seed: 3,
            ..Default::default()
        };
        let a = coupled_narrowband_pair(&config, &CoupledPairConfig::default()).unwrap();
        let b = coupled_narrowband_pair(&config, &CoupledPairConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_coupled_pair_rejects_empty_band() {
        let config = GeneratorConfig {
            length: 100,
            ..Default::default()
        };
        let coupling = CoupledPairConfig {
            center_hz: 15.0,
            ..Default::default()
        };
        assert!(coupled_narrowband_pair(&config, &coupling).is_err());
    }

    #[test]
    fn test_tone_pair_without_noise() {
        let config = GeneratorConfig {
            length: 300,
            ..Default::default()
        };
        let (x, y) = tone_pair(&config, 0.8, 0.25, 0.0).unwrap();
        assert_eq!(x[0], 0.0);
        assert_approx_eq!(y[0], 0.25f64.sin());
        assert!(x.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_white_noise_pair_moments() {
        let config = GeneratorConfig {
            length: 20000,
            seed: 8,
            ..Default::default()
        };
        let (x, y) = white_noise_pair(&config).unwrap();
        assert!(mean(&x).abs() < 0.05);
        assert!((population_std(&y) - 1.0).abs() < 0.05);
        assert_ne!(x, y);
    }

    #[test]
    fn test_binary_events_and_echo() {
        let config = GeneratorConfig {
            length: 5000,
            seed: 1,
            ..Default::default()
        };
        let plain = binary_events(&config, 0.05, None).unwrap();
        assert!(plain.iter().all(|&v| v == 0.0 || v == 1.0));
        let rate = mean(&plain);
        assert!((rate - 0.05).abs() < 0.015, "event rate {}", rate);

        let echo = EchoConfig::default();
        let echoed = binary_events(&config, 0.05, Some(&echo)).unwrap();
        assert!(echoed.iter().all(|&v| (0.0..=1.0).contains(&v)));
        for k in (250..5000).step_by(250) {
            for j in k..k + 3 {
                assert!(echoed[j] >= 0.3);
                assert_approx_eq!(echoed[j], (plain[j] + 0.3).min(1.0));
            }
        }
        // Untouched samples keep the base events.
        assert_eq!(echoed[0..250], plain[0..250]);
        assert_eq!(echoed[253..500], plain[253..500]);
    }

    #[test]
    fn test_generators_validate_input() {
        let short = GeneratorConfig {
            length: 1,
            ..Default::default()
        };
        assert!(white_noise_pair(&short).is_err());
        let config = GeneratorConfig::default();
        assert!(binary_events(&config, 1.5, None).is_err());
        let bad_echo = EchoConfig {
            every: 0,
            ..Default::default()
        };
        assert!(binary_events(&config, 0.05, Some(&bad_echo)).is_err());
        assert!(tone_pair(&config, 0.8, 0.0, -1.0).is_err());
    }
}
