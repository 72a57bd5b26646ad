//! Result records produced by the testers.
//!
//! All results are plain values, created once per call and owned by the
//! caller. Persistence lives in [`crate::records`].

use crate::band::{FrequencyBand, ReductionMode};
use crate::config::SweepTarget;
use crate::math_utils::{float_total_cmp, mean, percentile, population_std};
use crate::surrogates::{NullFamily, NullModel};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Null statistics of one surrogate family, in draw order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NullDistribution {
    /// Family that produced the draws
    pub family: NullFamily,
    /// One statistic per draw
    pub values: Vec<f64>,
}

impl NullDistribution {
    /// Number of draws.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no draws were taken.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Upper `1 - alpha` quantile of the draws.
    pub fn critical_value(&self, alpha: f64) -> f64 {
        let mut sorted = self.values.clone();
        sorted.sort_by(float_total_cmp);
        percentile(&sorted, 1.0 - alpha)
    }
}

/// Per-family comparison of the observed statistic against its null.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FamilyOutcome {
    /// Surrogate family
    pub family: NullFamily,
    /// Laplace-smoothed right-tailed p-value
    pub p_value: f64,
    /// `(stat - null_mean) / (null_std + ε)`
    pub z_score: f64,
    /// Mean of the null draws
    pub null_mean: f64,
    /// Population std of the null draws
    pub null_std: f64,
    /// Upper `1 - alpha` quantile of the null draws
    pub critical_value: f64,
}

/// Outcome of one band-coherence significance test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoherenceTestResult {
    /// Observed band statistic
    pub stat: f64,
    /// Fraction of the frequency grid inside the band
    pub band_fraction: f64,
    /// Bins inside the band
    pub n_bins: usize,
    /// Segment length used
    pub nperseg: usize,
    /// Tested band
    pub band: FrequencyBand,
    /// Band reduction
    pub reduction: ReductionMode,
    /// Null selector
    pub null_mode: NullModel,
    /// Draws per family
    pub n_null: usize,
    /// Per-family outcomes in reporting order
    pub families: Vec<FamilyOutcome>,
    /// Largest per-family p-value
    pub p_value_final: f64,
    /// Smallest per-family z-score
    pub z_score_final: f64,
    /// Significance level of the decision
    pub alpha: f64,
    /// `p_value_final < alpha`
    pub decision_at_alpha: bool,
    /// Seed the test ran with
    pub seed: u64,
    /// Raw null draws, not persisted
    #[cfg_attr(feature = "serde", serde(skip))]
    pub null_distributions: Vec<NullDistribution>,
}

impl CoherenceTestResult {
    /// Outcome of a single family, if it was evaluated.
    pub fn family(&self, family: NullFamily) -> Option<&FamilyOutcome> {
        self.families.iter().find(|f| f.family == family)
    }

    /// p-value of a single family, if it was evaluated.
    pub fn p_value(&self, family: NullFamily) -> Option<f64> {
        self.family(family).map(|f| f.p_value)
    }

    /// True when no frequency bin fell inside the tested band.
    pub fn is_degenerate(&self) -> bool {
        self.n_bins == 0
    }

    /// Smallest attainable p-value for this draw count.
    pub fn p_value_floor(&self) -> f64 {
        1.0 / (self.n_null as f64 + 1.0)
    }
}

/// Outcome of a forward/backward band sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HysteresisResult {
    /// Ascending parameter grid
    pub u_grid: Vec<f64>,
    /// Statistic at `u_grid[i]`, ascending pass
    pub forward: Vec<f64>,
    /// Statistic at `u_grid[i]`, descending pass, aligned to `u_grid`
    pub backward: Vec<f64>,
    /// Descending pass in traversal order
    pub backward_trace: Vec<f64>,
    /// Trapezoidal integral of `|forward - backward|` over `u_grid`
    pub loop_area: f64,
    /// Threshold crossing of the ascending pass
    pub theta_up: Option<f64>,
    /// Threshold crossing of the descending pass
    pub theta_down: Option<f64>,
    /// Swept band parameter
    pub sweep: SweepTarget,
    /// Band reduction
    pub reduction: ReductionMode,
    /// Segment length used
    pub nperseg: usize,
    /// Band the sweep is anchored on
    pub base_band: FrequencyBand,
}

impl HysteresisResult {
    /// `theta_up - theta_down` when both crossings exist.
    pub fn threshold_gap(&self) -> Option<f64> {
        Some(self.theta_up? - self.theta_down?)
    }
}

/// Outcome of the long-return block-permutation test.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LongReturnResult {
    /// Mean autocorrelation over the tail half of lags
    pub stat: f64,
    /// Laplace-smoothed right-tailed p-value
    pub p_value: f64,
    /// `(stat - null_mean) / (null_std + ε)`
    pub z_score: f64,
    /// Mean autocorrelation over all lags `1..=max_lag`
    pub mean_acf: f64,
    /// Largest lag
    pub max_lag: usize,
    /// Block length of the permutation null
    pub block_size: usize,
    /// Permutations
    pub n_null: usize,
    /// Seed the test ran with
    pub seed: u64,
}

/// Mean and population std of a set of null draws.
pub(crate) fn null_moments(values: &[f64]) -> (f64, f64) {
    (mean(values), population_std(values))
}
