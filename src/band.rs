//! Frequency bands and scalar reductions of a coherence curve.

use crate::errors::{SurrogateResult, SurrogateTestError};
use crate::math_utils::{float_total_cmp, mean};
use crate::spectral::{coherence_curve, CoherenceCurve};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default fraction trimmed from each end by [`ReductionMode::TrimmedMean`].
pub const DEFAULT_TRIM: f64 = 0.1;

/// Closed frequency interval `[low, high]` in Hz with `0 < low < high`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "(f64, f64)", into = "(f64, f64)"))]
pub struct FrequencyBand {
    low: f64,
    high: f64,
}

impl FrequencyBand {
    /// Build a band, rejecting non-positive, inverted or non-finite edges.
    pub fn new(low: f64, high: f64) -> SurrogateResult<Self> {
        if !low.is_finite() || low <= 0.0 {
            return Err(SurrogateTestError::invalid(
                "band_low",
                low,
                "must be finite and > 0",
            ));
        }
        if !high.is_finite() || high <= low {
            return Err(SurrogateTestError::invalid(
                "band_high",
                high,
                format!("must be finite and > band_low ({})", low),
            ));
        }
        Ok(Self { low, high })
    }

    /// Band from literal edges already known to satisfy `0 < low < high`.
    pub(crate) const fn from_trusted(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Lower edge in Hz.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Upper edge in Hz.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// `high - low`.
    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    /// Center of the band.
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.low + self.high)
    }

    /// Inclusive membership test.
    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low && frequency <= self.high
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] Hz", self.low, self.high)
    }
}

impl TryFrom<(f64, f64)> for FrequencyBand {
    type Error = SurrogateTestError;

    fn try_from((low, high): (f64, f64)) -> Result<Self, Self::Error> {
        FrequencyBand::new(low, high)
    }
}

impl From<FrequencyBand> for (f64, f64) {
    fn from(band: FrequencyBand) -> Self {
        (band.low, band.high)
    }
}

/// Reduction applied to the in-band coherence values.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReductionMode {
    /// Arithmetic mean
    Mean,
    /// Maximum
    Peak,
    /// Mean after dropping `trim` of the sorted values from each end
    TrimmedMean {
        /// Fraction removed from each end, in `[0, 0.5)`
        trim: f64,
    },
}

impl Default for ReductionMode {
    fn default() -> Self {
        ReductionMode::Mean
    }
}

impl ReductionMode {
    /// Check the trim fraction of a trimmed mean.
    pub fn validate(&self) -> SurrogateResult<()> {
        if let ReductionMode::TrimmedMean { trim } = *self {
            if !(0.0..0.5).contains(&trim) {
                return Err(SurrogateTestError::invalid("trim", trim, "[0, 0.5)"));
            }
        }
        Ok(())
    }

    /// Reduce a non-empty set of values.
    fn reduce(&self, values: &[f64]) -> f64 {
        match *self {
            ReductionMode::Mean => mean(values),
            ReductionMode::Peak => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            ReductionMode::TrimmedMean { trim } => trimmed_mean(values, trim),
        }
    }
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMode::Mean => write!(f, "mean"),
            ReductionMode::Peak => write!(f, "peak"),
            ReductionMode::TrimmedMean { trim } if *trim == DEFAULT_TRIM => {
                write!(f, "trimmed-mean")
            }
            ReductionMode::TrimmedMean { trim } => write!(f, "trimmed-mean:{}", trim),
        }
    }
}

impl FromStr for ReductionMode {
    type Err = SurrogateTestError;

    /// Accepts `mean`, `peak`, `trimmed-mean` and `trimmed-mean:<trim>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let mode = match lower.as_str() {
            "mean" => ReductionMode::Mean,
            "peak" => ReductionMode::Peak,
            "trimmed-mean" | "trimmed_mean" => ReductionMode::TrimmedMean { trim: DEFAULT_TRIM },
            other => match other
                .strip_prefix("trimmed-mean:")
                .or_else(|| other.strip_prefix("trimmed_mean:"))
            {
                Some(trim) => {
                    let trim: f64 = trim.parse().map_err(|_| {
                        SurrogateTestError::invalid("trim", f64::NAN, "a number in [0, 0.5)")
                    })?;
                    ReductionMode::TrimmedMean { trim }
                }
                None => {
                    return Err(SurrogateTestError::invalid(
                        "reduction_mode",
                        f64::NAN,
                        format!("one of mean|peak|trimmed-mean, got '{}'", s),
                    ))
                }
            },
        };
        mode.validate()?;
        Ok(mode)
    }
}

/// Mean of the values left after dropping `floor(trim·m)` from each end of
/// the sorted sequence; the plain mean if nothing would remain.
pub fn trimmed_mean(values: &[f64], trim: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(float_total_cmp);

    let m = sorted.len();
    let k = (trim.max(0.0) * m as f64).floor() as usize;
    if 2 * k >= m {
        return mean(&sorted);
    }
    mean(&sorted[k..m - k])
}

/// Scalar reduction of a coherence curve over a band.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BandStatistic {
    /// Reduced coherence, `0.0` when the band holds no bins
    pub value: f64,
    /// Fraction of the full frequency grid inside the band
    pub band_fraction: f64,
    /// Number of bins inside the band
    pub n_bins: usize,
}

impl BandStatistic {
    /// True when no frequency bin fell inside the band.
    pub fn is_empty_band(&self) -> bool {
        self.n_bins == 0
    }
}

/// Reduce the in-band part of `curve` to one scalar.
///
/// An empty band mask is not an error: it yields `value = 0` and
/// `band_fraction = 0`, so callers must look at `band_fraction` to tell a
/// band narrower than the resolution apart from genuinely zero coupling.
pub fn band_statistic(
    curve: &CoherenceCurve,
    band: &FrequencyBand,
    mode: ReductionMode,
) -> BandStatistic {
    let in_band: Vec<f64> = curve
        .frequencies
        .iter()
        .zip(&curve.coherence)
        .filter(|(&f, _)| band.contains(f))
        .map(|(_, &c)| c)
        .collect();

    if in_band.is_empty() {
        return BandStatistic {
            value: 0.0,
            band_fraction: 0.0,
            n_bins: 0,
        };
    }

    BandStatistic {
        value: mode.reduce(&in_band),
        band_fraction: in_band.len() as f64 / curve.len() as f64,
        n_bins: in_band.len(),
    }
}

/// Welch coherence of `x` and `y` reduced over `band`.
pub fn band_coherence(
    x: &[f64],
    y: &[f64],
    fs: f64,
    nperseg: usize,
    band: &FrequencyBand,
    mode: ReductionMode,
) -> SurrogateResult<BandStatistic> {
    let curve = coherence_curve(x, y, fs, nperseg)?;
    Ok(band_statistic(&curve, band, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn curve() -> CoherenceCurve {
        // 0.0, 0.5, ..., 5.0 Hz
        let frequencies: Vec<f64> = (0..=10).map(|k| k as f64 * 0.5).collect();
        let coherence = vec![0.0, 0.1, 0.9, 0.2, 0.4, 0.3, 0.0, 0.0, 0.0, 0.0, 1.0];
        CoherenceCurve {
            frequencies,
            coherence,
        }
    }

    #[test]
    fn test_band_validation() {
        assert!(FrequencyBand::new(0.7, 0.9).is_ok());
        assert!(FrequencyBand::new(0.0, 0.9).unwrap_err().is_invalid_parameter());
        assert!(FrequencyBand::new(-1.0, 0.9).is_err());
        assert!(FrequencyBand::new(0.9, 0.7).is_err());
        assert!(FrequencyBand::new(0.8, 0.8).is_err());
        assert!(FrequencyBand::new(0.8, f64::INFINITY).is_err());
    }

    #[test]
    fn test_band_geometry() {
        let b = FrequencyBand::new(0.78, 0.82).unwrap();
        assert_approx_eq!(b.width(), 0.04, 1e-12);
        assert_approx_eq!(b.midpoint(), 0.8, 1e-12);
        assert!(b.contains(0.78) && b.contains(0.82));
        assert!(!b.contains(0.83));
    }

    #[test]
    fn test_mean_and_peak_inclusive_edges() {
        let c = curve();
        let b = FrequencyBand::new(0.5, 1.5).unwrap();
        let mean_stat = band_statistic(&c, &b, ReductionMode::Mean);
        assert_eq!(mean_stat.n_bins, 3);
        assert_approx_eq!(mean_stat.value, (0.1 + 0.9 + 0.2) / 3.0);
        assert_approx_eq!(mean_stat.band_fraction, 3.0 / 11.0);

        let peak = band_statistic(&c, &b, ReductionMode::Peak);
        assert_eq!(peak.value, 0.9);
    }

    #[test]
    fn test_trimmed_mean_drops_extremes() {
        let c = curve();
        let b = FrequencyBand::new(0.5, 2.5).unwrap();
        // in band: 0.1, 0.9, 0.2, 0.4, 0.3 -> trim 0.2 drops one from each end
        let stat = band_statistic(&c, &b, ReductionMode::TrimmedMean { trim: 0.2 });
        assert_approx_eq!(stat.value, 0.3);
    }

    #[test]
    fn test_trimmed_mean_falls_back_to_mean() {
        assert_approx_eq!(trimmed_mean(&[0.2, 0.4], 0.49), 0.3);
        assert_approx_eq!(trimmed_mean(&[1.0], 0.4), 1.0);
        assert_eq!(trimmed_mean(&[], 0.1), 0.0);
        // 0.49 * 3 floors to 1: the median survives.
        assert_approx_eq!(trimmed_mean(&[0.0, 0.5, 10.0], 0.49), 0.5);
    }

    #[test]
    fn test_empty_band_is_degenerate_not_error() {
        let c = curve();
        let b = FrequencyBand::new(50.0, 60.0).unwrap();
        let stat = band_statistic(&c, &b, ReductionMode::Peak);
        assert_eq!(stat.value, 0.0);
        assert_eq!(stat.band_fraction, 0.0);
        assert!(stat.is_empty_band());
    }

    #[test]
    fn test_reduction_mode_parsing() {
        assert_eq!("mean".parse::<ReductionMode>().unwrap(), ReductionMode::Mean);
        assert_eq!("PEAK".parse::<ReductionMode>().unwrap(), ReductionMode::Peak);
        assert_eq!(
            "trimmed-mean".parse::<ReductionMode>().unwrap(),
            ReductionMode::TrimmedMean { trim: DEFAULT_TRIM }
        );
        assert_eq!(
            "trimmed-mean:0.25".parse::<ReductionMode>().unwrap(),
            ReductionMode::TrimmedMean { trim: 0.25 }
        );
        assert!("trimmed-mean:0.6".parse::<ReductionMode>().is_err());
        assert!("median".parse::<ReductionMode>().is_err());
        assert_eq!(ReductionMode::TrimmedMean { trim: DEFAULT_TRIM }.to_string(), "trimmed-mean");
    }
}
