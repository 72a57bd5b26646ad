//! # Test Configuration
//!
//! One explicitly typed configuration per test family. Every configuration
//! has a `Default` matching the reference experiment settings, a cheap
//! `quick()` preset for smoke runs, and a `validate()` that rejects bad
//! settings with [`SurrogateTestError::InvalidParameter`] before any data is
//! touched.

use crate::band::{FrequencyBand, ReductionMode};
use crate::errors::{validate_parameter, SurrogateResult, SurrogateTestError};
use crate::spectral::{SegmentPolicy, MIN_NPERSEG};
use crate::surrogates::{NullModel, SurrogateConfig};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Significance level used by every test family unless overridden.
pub const DEFAULT_ALPHA: f64 = 0.05;

fn validate_sample_rate(fs: f64) -> SurrogateResult<()> {
    if !(fs.is_finite() && fs > 0.0) {
        return Err(SurrogateTestError::invalid("fs", fs, "must be finite and > 0"));
    }
    Ok(())
}

fn validate_segment_policy(policy: &SegmentPolicy) -> SurrogateResult<()> {
    match *policy {
        SegmentPolicy::Fixed(nperseg) if nperseg < MIN_NPERSEG => Err(SurrogateTestError::invalid(
            "nperseg",
            nperseg as f64,
            format!(">= {}", MIN_NPERSEG),
        )),
        SegmentPolicy::Auto {
            target_segments: 0, ..
        } => Err(SurrogateTestError::invalid("target_segments", 0.0, "must be positive")),
        SegmentPolicy::Auto {
            min_bins: Some(0), ..
        } => Err(SurrogateTestError::invalid("min_bins", 0.0, "must be positive")),
        _ => Ok(()),
    }
}

fn validate_null_count(n_null: usize) -> SurrogateResult<()> {
    if n_null == 0 {
        return Err(SurrogateTestError::invalid("n_null", 0.0, "must be positive"));
    }
    Ok(())
}

/// Configuration of a band-coherence significance test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoherenceTestConfig {
    /// Sample rate in Hz
    pub fs: f64,
    /// Band whose coherence is tested
    pub band: FrequencyBand,
    /// Welch segment-length policy
    pub segment_policy: SegmentPolicy,
    /// Null family or conservative combination
    pub null_model: NullModel,
    /// Surrogate draws per family
    pub n_null: usize,
    /// Band reduction
    pub reduction: ReductionMode,
    /// Shared surrogate parameters
    pub surrogate: SurrogateConfig,
    /// Significance level of the decision flag
    pub alpha: f64,
    /// Top-level seed; every draw derives its own substream from it
    pub seed: u64,
    /// Fan out the null loop when the `parallel` feature is enabled
    pub parallel: bool,
}

impl Default for CoherenceTestConfig {
    fn default() -> Self {
        Self {
            fs: 20.0,
            band: FrequencyBand::from_trusted(0.7, 0.9),
            segment_policy: SegmentPolicy::auto(),
            null_model: NullModel::All,
            n_null: 300,
            reduction: ReductionMode::Mean,
            surrogate: SurrogateConfig::default(),
            alpha: DEFAULT_ALPHA,
            seed: 0,
            parallel: true,
        }
    }
}

impl CoherenceTestConfig {
    /// Few draws, for smoke runs and tests.
    pub fn quick() -> Self {
        Self {
            n_null: 99,
            ..Self::default()
        }
    }

    /// Start a fluent builder from the defaults.
    pub fn builder() -> CoherenceTestConfigBuilder {
        CoherenceTestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> SurrogateResult<()> {
        validate_sample_rate(self.fs)?;
        validate_segment_policy(&self.segment_policy)?;
        validate_null_count(self.n_null)?;
        self.reduction.validate()?;
        self.surrogate.validate()?;
        validate_parameter(self.alpha, 0.0, 1.0, "alpha")?;
        if self.alpha == 0.0 || self.alpha == 1.0 {
            return Err(SurrogateTestError::invalid("alpha", self.alpha, "(0, 1)"));
        }
        if self.band.high() > self.fs / 2.0 {
            log::warn!(
                "band {} extends beyond Nyquist ({} Hz); upper bins will be empty",
                self.band,
                self.fs / 2.0
            );
        }
        Ok(())
    }
}

/// Fluent builder for [`CoherenceTestConfig`].
#[derive(Debug, Clone)]
pub struct CoherenceTestConfigBuilder {
    config: CoherenceTestConfig,
}

impl CoherenceTestConfigBuilder {
    /// Set the sample rate.
    pub fn fs(mut self, fs: f64) -> Self {
        self.config.fs = fs;
        self
    }

    /// Set the tested band.
    pub fn band(mut self, band: FrequencyBand) -> Self {
        self.config.band = band;
        self
    }

    /// Set the segment-length policy.
    pub fn segment_policy(mut self, policy: SegmentPolicy) -> Self {
        self.config.segment_policy = policy;
        self
    }

    /// Set the null model.
    pub fn null_model(mut self, null_model: NullModel) -> Self {
        self.config.null_model = null_model;
        self
    }

    /// Set the number of draws per family.
    pub fn n_null(mut self, n_null: usize) -> Self {
        self.config.n_null = n_null;
        self
    }

    /// Set the band reduction.
    pub fn reduction(mut self, reduction: ReductionMode) -> Self {
        self.config.reduction = reduction;
        self
    }

    /// Set the excluded shift fraction.
    pub fn shift_min_frac(mut self, frac: f64) -> Self {
        self.config.surrogate.shift_min_frac = frac;
        self
    }

    /// Set the significance level.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Set the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Enable or disable the parallel null loop.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> SurrogateResult<CoherenceTestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Which band parameter the hysteresis sweep moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SweepTarget {
    /// Band `(u, base_high)`
    #[default]
    LowEdge,
    /// Band `(base_low, u)`
    HighEdge,
    /// Band of width `base_width·u` centered on the base midpoint
    Width,
}

impl SweepTarget {
    /// Band evaluated at grid value `u`, `None` when it is empty or inverted.
    pub fn band_at(self, base: &FrequencyBand, u: f64) -> Option<FrequencyBand> {
        let (low, high) = match self {
            SweepTarget::LowEdge => (u, base.high()),
            SweepTarget::HighEdge => (base.low(), u),
            SweepTarget::Width => {
                let half = 0.5 * base.width() * u;
                (base.midpoint() - half, base.midpoint() + half)
            }
        };
        FrequencyBand::new(low, high).ok()
    }
}

impl fmt::Display for SweepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SweepTarget::LowEdge => "low_edge",
            SweepTarget::HighEdge => "high_edge",
            SweepTarget::Width => "width",
        })
    }
}

impl FromStr for SweepTarget {
    type Err = SurrogateTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "low_edge" => Ok(SweepTarget::LowEdge),
            "high_edge" => Ok(SweepTarget::HighEdge),
            "width" => Ok(SweepTarget::Width),
            _ => Err(SurrogateTestError::invalid(
                "sweep",
                f64::NAN,
                format!("one of low_edge|high_edge|width, got '{}'", s),
            )),
        }
    }
}

/// Rule locating `Theta_up` and `Theta_down` on a sweep curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CrossingDetector {
    /// First grid point reaching the midpoint between curve min and max
    #[default]
    Midpoint,
    /// Grid point after the largest absolute step
    Gradient,
}

impl fmt::Display for CrossingDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CrossingDetector::Midpoint => "midpoint",
            CrossingDetector::Gradient => "gradient",
        })
    }
}

impl FromStr for CrossingDetector {
    type Err = SurrogateTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "midpoint" => Ok(CrossingDetector::Midpoint),
            "gradient" => Ok(CrossingDetector::Gradient),
            _ => Err(SurrogateTestError::invalid(
                "crossing",
                f64::NAN,
                format!("one of midpoint|gradient, got '{}'", s),
            )),
        }
    }
}

/// Configuration of a forward/backward band sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HysteresisConfig {
    /// Sample rate in Hz
    pub fs: f64,
    /// Band the sweep is anchored on
    pub base_band: FrequencyBand,
    /// Swept band parameter
    pub sweep: SweepTarget,
    /// First grid value
    pub u_min: f64,
    /// Last grid value
    pub u_max: f64,
    /// Number of grid points
    pub n_steps: usize,
    /// Welch segment-length policy
    pub segment_policy: SegmentPolicy,
    /// Band reduction
    pub reduction: ReductionMode,
    /// Threshold-crossing rule
    pub crossing: CrossingDetector,
    /// Std of fresh Gaussian noise added to both series per evaluation
    pub noise: f64,
    /// Seed of the noise generator
    pub seed: u64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            fs: 20.0,
            base_band: FrequencyBand::from_trusted(0.78, 0.82),
            sweep: SweepTarget::LowEdge,
            u_min: 0.5,
            u_max: 1.0,
            n_steps: 21,
            segment_policy: SegmentPolicy::Fixed(128),
            reduction: ReductionMode::Mean,
            crossing: CrossingDetector::Midpoint,
            noise: 0.0,
            seed: 0,
        }
    }
}

impl HysteresisConfig {
    /// Coarse grid.
    pub fn quick() -> Self {
        Self {
            n_steps: 11,
            ..Self::default()
        }
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> SurrogateResult<()> {
        validate_sample_rate(self.fs)?;
        validate_segment_policy(&self.segment_policy)?;
        self.reduction.validate()?;
        if self.n_steps < 2 {
            return Err(SurrogateTestError::invalid(
                "n_steps",
                self.n_steps as f64,
                ">= 2",
            ));
        }
        if !self.u_min.is_finite() {
            return Err(SurrogateTestError::invalid("u_min", self.u_min, "must be finite"));
        }
        if !(self.u_max.is_finite() && self.u_max > self.u_min) {
            return Err(SurrogateTestError::invalid(
                "u_max",
                self.u_max,
                format!("must be finite and > u_min ({})", self.u_min),
            ));
        }
        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(SurrogateTestError::invalid("noise", self.noise, ">= 0"));
        }
        Ok(())
    }
}

/// Configuration of the long-return block-permutation test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LongReturnConfig {
    /// Largest autocorrelation lag
    pub max_lag: usize,
    /// Block permutations
    pub n_null: usize,
    /// Block length, `max(5, max_lag / 10)` when unset
    pub block_size: Option<usize>,
    /// Seed of the permutation generator
    pub seed: u64,
    /// Fan out the permutation loop when the `parallel` feature is enabled
    pub parallel: bool,
}

impl Default for LongReturnConfig {
    fn default() -> Self {
        Self {
            max_lag: 200,
            n_null: 200,
            block_size: None,
            seed: 0,
            parallel: true,
        }
    }
}

impl LongReturnConfig {
    /// Few permutations, for smoke runs and tests.
    pub fn quick() -> Self {
        Self {
            n_null: 99,
            ..Self::default()
        }
    }

    /// Block length actually used.
    pub fn effective_block_size(&self) -> usize {
        self.block_size.unwrap_or_else(|| (self.max_lag / 10).max(5))
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> SurrogateResult<()> {
        if self.max_lag == 0 {
            return Err(SurrogateTestError::invalid("max_lag", 0.0, ">= 1"));
        }
        validate_null_count(self.n_null)?;
        if self.block_size == Some(0) {
            return Err(SurrogateTestError::invalid("block_size", 0.0, ">= 1"));
        }
        Ok(())
    }
}
