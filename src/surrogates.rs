//! Null-preserving surrogate generators for series pairs.
//!
//! Each family keeps the power spectrum of both series intact and destroys a
//! different part of their joint structure:
//!
//! - **flip**: random sign per series plus a circular shift of `y` outside a
//!   forbidden window around zero lag
//! - **phase**: independent Fourier phase randomization of each series
//! - **shift**: circular shift of `y` alone, no sign change
//!
//! All generators are pure functions of the input pair and the supplied
//! [`SecureRng`].

use crate::errors::{validate_equal_length, validate_parameter, SurrogateResult, SurrogateTestError};
use crate::fft_ops::{irfft, rfft};
use crate::secure_rng::SecureRng;
use num_complex::Complex64;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single surrogate family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NullFamily {
    /// Sign flip plus restricted circular shift
    Flip,
    /// Fourier phase randomization
    Phase,
    /// Restricted circular shift only
    Shift,
}

impl NullFamily {
    /// Substream index used when seeding draws of this family.
    pub fn stream(self) -> usize {
        match self {
            NullFamily::Flip => 1,
            NullFamily::Phase => 2,
            NullFamily::Shift => 3,
        }
    }

    /// Lowercase token.
    pub fn as_str(self) -> &'static str {
        match self {
            NullFamily::Flip => "flip",
            NullFamily::Phase => "phase",
            NullFamily::Shift => "shift",
        }
    }
}

impl fmt::Display for NullFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Null selector of a coherence test: one family or a conservative combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NullModel {
    /// Flip family only
    Flip,
    /// Phase family only
    Phase,
    /// Shift family only
    Shift,
    /// Flip and phase
    Both,
    /// Flip, phase and shift
    #[default]
    All,
}

impl NullModel {
    /// Families evaluated under this model, in reporting order.
    pub fn families(self) -> &'static [NullFamily] {
        match self {
            NullModel::Flip => &[NullFamily::Flip],
            NullModel::Phase => &[NullFamily::Phase],
            NullModel::Shift => &[NullFamily::Shift],
            NullModel::Both => &[NullFamily::Flip, NullFamily::Phase],
            NullModel::All => &[NullFamily::Flip, NullFamily::Phase, NullFamily::Shift],
        }
    }

    /// True when more than one family is combined.
    pub fn is_combined(self) -> bool {
        self.families().len() > 1
    }

    /// Lowercase token.
    pub fn as_str(self) -> &'static str {
        match self {
            NullModel::Flip => "flip",
            NullModel::Phase => "phase",
            NullModel::Shift => "shift",
            NullModel::Both => "both",
            NullModel::All => "all",
        }
    }

    /// Schema tag for persisted coherence results under this model.
    pub fn schema_version(self) -> &'static str {
        match self {
            NullModel::Flip => "coherence-flip-v1",
            NullModel::Phase => "coherence-phase-v1",
            NullModel::Shift => "coherence-shift-v1",
            NullModel::Both => "coherence-both-v1",
            NullModel::All => "coherence-all-v1",
        }
    }
}

impl fmt::Display for NullModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NullModel {
    type Err = SurrogateTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flip" => Ok(NullModel::Flip),
            "phase" => Ok(NullModel::Phase),
            "shift" => Ok(NullModel::Shift),
            "both" => Ok(NullModel::Both),
            "all" => Ok(NullModel::All),
            _ => Err(SurrogateTestError::invalid(
                "null_mode",
                f64::NAN,
                format!("one of flip|phase|shift|both|all, got '{}'", s),
            )),
        }
    }
}

impl From<NullFamily> for NullModel {
    fn from(family: NullFamily) -> Self {
        match family {
            NullFamily::Flip => NullModel::Flip,
            NullFamily::Phase => NullModel::Phase,
            NullFamily::Shift => NullModel::Shift,
        }
    }
}

/// Parameters shared by the surrogate families.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SurrogateConfig {
    /// Fraction of the series length excluded around zero lag on each side
    pub shift_min_frac: f64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            shift_min_frac: 0.1,
        }
    }
}

impl SurrogateConfig {
    /// Check `shift_min_frac ∈ [0, 0.5)`.
    pub fn validate(&self) -> SurrogateResult<()> {
        validate_parameter(self.shift_min_frac, 0.0, 0.5, "shift_min_frac")?;
        if self.shift_min_frac >= 0.5 {
            return Err(SurrogateTestError::invalid(
                "shift_min_frac",
                self.shift_min_frac,
                "[0, 0.5)",
            ));
        }
        Ok(())
    }

    /// Admissible circular offsets `[m, n - m]` with `m = max(1, floor(frac·n))`.
    pub fn shift_range(&self, n: usize) -> SurrogateResult<(usize, usize)> {
        let m = ((self.shift_min_frac * n as f64).floor() as usize).max(1);
        if n < 2 * m {
            return Err(SurrogateTestError::InsufficientData {
                required: 2 * m,
                actual: n,
            });
        }
        Ok((m, n - m))
    }
}

/// Rotate right by `offset`: `out[i] = data[(i + n - offset) % n]`.
pub fn circular_shift(data: &[f64], offset: usize) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = data.to_vec();
    out.rotate_right(offset % n);
    out
}

/// Circularly shift `y` by an offset drawn from the admissible range.
///
/// `x` is returned unchanged.
pub fn circular_shift_surrogate(
    x: &[f64],
    y: &[f64],
    config: &SurrogateConfig,
    rng: &mut SecureRng,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    validate_equal_length(x, y)?;
    let (lo, hi) = config.shift_range(y.len())?;
    let offset = rng.usize_inclusive(lo..=hi);
    Ok((x.to_vec(), circular_shift(y, offset)))
}

/// Random sign on each series and a restricted circular shift of `y`.
pub fn flip_shift_surrogate(
    x: &[f64],
    y: &[f64],
    config: &SurrogateConfig,
    rng: &mut SecureRng,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    validate_equal_length(x, y)?;
    let (lo, hi) = config.shift_range(y.len())?;

    let sign_x = rng.sign();
    let sign_y = rng.sign();
    let offset = rng.usize_inclusive(lo..=hi);

    let xs = x.iter().map(|&v| sign_x * v).collect();
    let ys = circular_shift(y, offset)
        .into_iter()
        .map(|v| sign_y * v)
        .collect();
    Ok((xs, ys))
}

/// Replace the Fourier phases of one series with uniform draws.
///
/// Magnitudes are kept exactly. DC and, for even lengths, Nyquist bins keep
/// their original real values so the inverse transform is real.
pub fn phase_randomize(data: &[f64], rng: &mut SecureRng) -> SurrogateResult<Vec<f64>> {
    let n = data.len();
    if n < 2 {
        return Err(SurrogateTestError::InsufficientData {
            required: 2,
            actual: n,
        });
    }

    let mut spectrum = rfft(data)?;
    let last = spectrum.len() - 1;
    let has_nyquist = n % 2 == 0;

    for (k, bin) in spectrum.iter_mut().enumerate().skip(1) {
        if has_nyquist && k == last {
            continue;
        }
        *bin = Complex64::from_polar(bin.norm(), rng.phase());
    }

    irfft(&spectrum, n)
}

/// Phase-randomize each series with independent phases.
pub fn phase_surrogate(
    x: &[f64],
    y: &[f64],
    rng: &mut SecureRng,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    validate_equal_length(x, y)?;
    let xs = phase_randomize(x, rng)?;
    let ys = phase_randomize(y, rng)?;
    Ok((xs, ys))
}

/// One surrogate pair from the given family.
pub fn generate_surrogate_pair(
    family: NullFamily,
    x: &[f64],
    y: &[f64],
    config: &SurrogateConfig,
    rng: &mut SecureRng,
) -> SurrogateResult<(Vec<f64>, Vec<f64>)> {
    match family {
        NullFamily::Flip => flip_shift_surrogate(x, y, config, rng),
        NullFamily::Phase => phase_surrogate(x, y, rng),
        NullFamily::Shift => circular_shift_surrogate(x, y, config, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft_ops::rfft;
    use assert_approx_eq::assert_approx_eq;

    fn series(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = SecureRng::with_seed(seed);
        (0..n).map(|_| rng.standard_normal()).collect()
    }

    fn magnitudes(data: &[f64]) -> Vec<f64> {
        rfft(data).unwrap().iter().map(|c| c.norm()).collect()
    }

    #[test]
    fn test_null_model_families() {
        assert_eq!(NullModel::Flip.families(), &[NullFamily::Flip]);
        assert_eq!(
            NullModel::Both.families(),
            &[NullFamily::Flip, NullFamily::Phase]
        );
        assert_eq!(NullModel::All.families().len(), 3);
        assert!(NullModel::All.is_combined());
        assert!(!NullModel::Shift.is_combined());
        assert_eq!(NullModel::default(), NullModel::All);
    }

    #[test]
    fn test_null_model_tokens() {
        for model in [
            NullModel::Flip,
            NullModel::Phase,
            NullModel::Shift,
            NullModel::Both,
            NullModel::All,
        ] {
            assert_eq!(model.to_string().parse::<NullModel>().unwrap(), model);
        }
        assert_eq!(" ALL ".parse::<NullModel>().unwrap(), NullModel::All);
        assert!("strict".parse::<NullModel>().unwrap_err().is_invalid_parameter());
        assert_eq!(NullModel::Both.schema_version(), "coherence-both-v1");
    }

    #[test]
    fn test_shift_range() {
        let cfg = SurrogateConfig::default();
        assert_eq!(cfg.shift_range(1000).unwrap(), (100, 900));
        // Zero fraction still excludes the identity shift.
        let cfg0 = SurrogateConfig { shift_min_frac: 0.0 };
        assert_eq!(cfg0.shift_range(10).unwrap(), (1, 9));
        assert!(cfg.shift_range(1).is_err());
        assert!(SurrogateConfig { shift_min_frac: 0.5 }.validate().is_err());
        assert!(SurrogateConfig { shift_min_frac: -0.1 }.validate().is_err());
    }

    #[test]
    fn test_circular_shift() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(circular_shift(&v, 2), vec![4.0, 5.0, 1.0, 2.0, 3.0]);
        assert_eq!(circular_shift(&v, 5), v.to_vec());
        assert!(circular_shift(&[], 3).is_empty());
    }

    #[test]
    fn test_shift_surrogate_preserves_values_and_offset_window() {
        let x = series(500, 1);
        let y: Vec<f64> = (0..500).map(|i| i as f64).collect();
        let cfg = SurrogateConfig::default();
        for draw in 0..50 {
            let mut rng = SecureRng::for_draw(7, NullFamily::Shift.stream(), draw);
            let (xs, ys) = circular_shift_surrogate(&x, &y, &cfg, &mut rng).unwrap();
            assert_eq!(xs, x);
            // ys[0] = y[n - offset] = n - offset
            let offset = 500 - ys[0] as usize;
            assert!((50..=450).contains(&offset), "offset {}", offset);
        }
    }

    #[test]
    fn test_flip_surrogate_offset_window_and_signs() {
        let n = 500;
        let x = series(n, 1);
        // Distinct positive magnitudes so the offset can be read back.
        let y: Vec<f64> = (1..=n).map(|i| i as f64).collect();
        let cfg = SurrogateConfig::default();
        let (lo, hi) = cfg.shift_range(n).unwrap();
        let mut flipped_x = [false; 2];
        let mut flipped_y = [false; 2];

        for draw in 0..200 {
            let mut rng = SecureRng::for_draw(7, NullFamily::Flip.stream(), draw);
            let (xs, ys) = flip_shift_surrogate(&x, &y, &cfg, &mut rng).unwrap();

            // |ys[0]| = y[n - offset] = n - offset + 1
            let offset = n + 1 - ys[0].abs() as usize;
            assert!((lo..=hi).contains(&offset), "draw {} offset {}", draw, offset);

            let sign_y = ys[0].signum();
            let expected: Vec<f64> = circular_shift(&y, offset).iter().map(|v| sign_y * v).collect();
            assert_eq!(ys, expected);

            let sign_x = xs[0] / x[0];
            assert!(sign_x == 1.0 || sign_x == -1.0);
            assert!(xs.iter().zip(&x).all(|(a, b)| *a == sign_x * b));

            flipped_x[(sign_x < 0.0) as usize] = true;
            flipped_y[(sign_y < 0.0) as usize] = true;
        }
        assert_eq!(flipped_x, [true, true]);
        assert_eq!(flipped_y, [true, true]);
    }

    #[test]
    fn test_flip_surrogate_preserves_magnitude_spectrum() {
        let x = series(256, 2);
        let y = series(256, 3);
        let mut rng = SecureRng::with_seed(11);
        let (xs, ys) = flip_shift_surrogate(&x, &y, &SurrogateConfig::default(), &mut rng).unwrap();

        for (a, b) in magnitudes(&x).iter().zip(magnitudes(&xs).iter()) {
            assert_approx_eq!(a, b, 1e-9);
        }
        for (a, b) in magnitudes(&y).iter().zip(magnitudes(&ys).iter()) {
            assert_approx_eq!(a, b, 1e-9);
        }
        assert!(xs.iter().zip(&x).all(|(a, b)| a.abs() == b.abs()));
    }

    #[test]
    fn test_phase_surrogate_preserves_magnitudes_and_fixed_bins() {
        for &n in &[256usize, 255] {
            let x = series(n, 4);
            let mut rng = SecureRng::with_seed(5);
            let xs = phase_randomize(&x, &mut rng).unwrap();
            assert_eq!(xs.len(), n);

            let orig = rfft(&x).unwrap();
            let surr = rfft(&xs).unwrap();
            for (a, b) in orig.iter().zip(surr.iter()) {
                assert_approx_eq!(a.norm(), b.norm(), 1e-8);
            }
            assert_approx_eq!(orig[0].re, surr[0].re, 1e-8);
            if n % 2 == 0 {
                let last = orig.len() - 1;
                assert_approx_eq!(orig[last].re, surr[last].re, 1e-8);
            }
            assert!(xs.iter().zip(&x).any(|(a, b)| (a - b).abs() > 1e-6));
        }
    }

    #[test]
    fn test_phase_surrogate_uses_independent_phases() {
        let x = series(128, 6);
        let mut rng = SecureRng::with_seed(8);
        let (xs, ys) = phase_surrogate(&x, &x, &mut rng).unwrap();
        assert!(xs.iter().zip(&ys).any(|(a, b)| (a - b).abs() > 1e-6));
    }

    #[test]
    fn test_generators_are_reproducible_per_draw() {
        let x = series(300, 9);
        let y = series(300, 10);
        let cfg = SurrogateConfig::default();
        for family in [NullFamily::Flip, NullFamily::Phase, NullFamily::Shift] {
            let mut r1 = SecureRng::for_draw(0, family.stream(), 17);
            let mut r2 = SecureRng::for_draw(0, family.stream(), 17);
            let a = generate_surrogate_pair(family, &x, &y, &cfg, &mut r1).unwrap();
            let b = generate_surrogate_pair(family, &x, &y, &cfg, &mut r2).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_generators_reject_mismatched_lengths() {
        let x = series(100, 1);
        let y = series(99, 2);
        let mut rng = SecureRng::with_seed(0);
        let cfg = SurrogateConfig::default();
        for family in [NullFamily::Flip, NullFamily::Phase, NullFamily::Shift] {
            assert!(generate_surrogate_pair(family, &x, &y, &cfg, &mut rng)
                .unwrap_err()
                .is_invalid_parameter());
        }
    }
}
