//! Cross-run aggregation of test results.
//!
//! Summaries report count, mean, min and max of the headline numbers, the
//! fraction of runs significant at a given level (with a Wilson score
//! interval), and the distinct seeds involved. CSV tables (feature `serde`)
//! carry one line per run with one p-value column per null family.

use crate::errors::{validate_parameter, SurrogateResult, SurrogateTestError};
use crate::results::{CoherenceTestResult, HysteresisResult, LongReturnResult};
#[cfg(feature = "serde")]
use crate::surrogates::NullFamily;
#[cfg(feature = "serde")]
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use std::fmt;

/// Count, mean, min and max of a set of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    /// Number of values
    pub n: usize,
    /// Arithmetic mean, NaN when empty
    pub mean: f64,
    /// Minimum, NaN when empty
    pub min: f64,
    /// Maximum, NaN when empty
    pub max: f64,
}

impl SummaryStats {
    /// Summarize the finite entries of `values`.
    pub fn from_values(values: &[f64]) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Self {
                n: 0,
                mean: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        Self {
            n: finite.len(),
            mean: finite.iter().mean(),
            min: Statistics::min(&finite),
            max: Statistics::max(&finite),
        }
    }
}

impl fmt::Display for SummaryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.n == 0 {
            return write!(f, "n=0");
        }
        write!(
            f,
            "n={}, mean={:.4}, min={:.4}, max={:.4}",
            self.n, self.mean, self.min, self.max
        )
    }
}

/// Fraction of `hits` among `n` runs with a 95% Wilson score interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    /// `hits / n`
    pub value: f64,
    /// Lower interval bound
    pub lower: f64,
    /// Upper interval bound
    pub upper: f64,
}

impl Rate {
    /// Wilson score interval at 95% confidence.
    pub fn wilson(hits: usize, n: usize) -> SurrogateResult<Self> {
        if n == 0 {
            return Ok(Self {
                value: f64::NAN,
                lower: f64::NAN,
                upper: f64::NAN,
            });
        }
        let normal = Normal::new(0.0, 1.0).map_err(|_| SurrogateTestError::NumericalError {
            reason: "Failed to create standard normal distribution".to_string(),
            operation: Some("significance rate interval".to_string()),
        })?;
        let z = normal.inverse_cdf(0.975);

        let n_f = n as f64;
        let p = hits as f64 / n_f;
        let z2 = z * z;
        let denom = 1.0 + z2 / n_f;
        let center = (p + z2 / (2.0 * n_f)) / denom;
        let half = z * (p * (1.0 - p) / n_f + z2 / (4.0 * n_f * n_f)).sqrt() / denom;
        Ok(Self {
            value: p,
            lower: (center - half).max(0.0),
            upper: (center + half).min(1.0),
        })
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} [{:.3}, {:.3}]", self.value, self.lower, self.upper)
    }
}

fn sorted_seeds(seeds: impl Iterator<Item = u64>) -> Vec<u64> {
    let mut seeds: Vec<u64> = seeds.collect();
    seeds.sort_unstable();
    seeds.dedup();
    seeds
}

/// Aggregate of several coherence tests.
#[derive(Debug, Clone, PartialEq)]
pub struct CoherenceSummary {
    /// Number of runs
    pub runs: usize,
    /// Final p-values
    pub p_value_final: SummaryStats,
    /// Observed statistics
    pub stat: SummaryStats,
    /// Runs with `p_value_final < alpha`
    pub significance_rate: Rate,
    /// Runs whose band held no frequency bin
    pub degenerate_runs: usize,
    /// Distinct seeds, ascending
    pub seeds: Vec<u64>,
}

/// Summarize coherence results at significance level `alpha`.
pub fn summarize_coherence(
    results: &[CoherenceTestResult],
    alpha: f64,
) -> SurrogateResult<CoherenceSummary> {
    validate_parameter(alpha, 0.0, 1.0, "alpha")?;
    let p_values: Vec<f64> = results.iter().map(|r| r.p_value_final).collect();
    let stats: Vec<f64> = results.iter().map(|r| r.stat).collect();
    let hits = p_values.iter().filter(|&&p| p < alpha).count();

    Ok(CoherenceSummary {
        runs: results.len(),
        p_value_final: SummaryStats::from_values(&p_values),
        stat: SummaryStats::from_values(&stats),
        significance_rate: Rate::wilson(hits, results.len())?,
        degenerate_runs: results.iter().filter(|r| r.is_degenerate()).count(),
        seeds: sorted_seeds(results.iter().map(|r| r.seed)),
    })
}

/// Aggregate of several hysteresis sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisSummary {
    /// Number of runs
    pub runs: usize,
    /// Loop areas
    pub loop_area: SummaryStats,
    /// Ascending-pass crossings that exist
    pub theta_up: SummaryStats,
    /// Descending-pass crossings that exist
    pub theta_down: SummaryStats,
}

/// Summarize hysteresis sweeps.
pub fn summarize_hysteresis(results: &[HysteresisResult]) -> HysteresisSummary {
    let areas: Vec<f64> = results.iter().map(|r| r.loop_area).collect();
    let up: Vec<f64> = results.iter().filter_map(|r| r.theta_up).collect();
    let down: Vec<f64> = results.iter().filter_map(|r| r.theta_down).collect();
    HysteresisSummary {
        runs: results.len(),
        loop_area: SummaryStats::from_values(&areas),
        theta_up: SummaryStats::from_values(&up),
        theta_down: SummaryStats::from_values(&down),
    }
}

/// Aggregate of several long-return tests.
#[derive(Debug, Clone, PartialEq)]
pub struct LongReturnSummary {
    /// Number of runs
    pub runs: usize,
    /// p-values
    pub p_value: SummaryStats,
    /// Tail mean autocorrelations
    pub stat: SummaryStats,
    /// Runs with `p_value < alpha`
    pub significance_rate: Rate,
    /// Distinct seeds, ascending
    pub seeds: Vec<u64>,
}

/// Summarize long-return results at significance level `alpha`.
pub fn summarize_long_return(
    results: &[LongReturnResult],
    alpha: f64,
) -> SurrogateResult<LongReturnSummary> {
    validate_parameter(alpha, 0.0, 1.0, "alpha")?;
    let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
    let stats: Vec<f64> = results.iter().map(|r| r.stat).collect();
    let hits = p_values.iter().filter(|&&p| p < alpha).count();

    Ok(LongReturnSummary {
        runs: results.len(),
        p_value: SummaryStats::from_values(&p_values),
        stat: SummaryStats::from_values(&stats),
        significance_rate: Rate::wilson(hits, results.len())?,
        seeds: sorted_seeds(results.iter().map(|r| r.seed)),
    })
}

#[cfg(feature = "serde")]
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(feature = "serde")]
fn csv_error(err: impl fmt::Display) -> SurrogateTestError {
    SurrogateTestError::SerializationError {
        format: format!("CSV: {}", err),
    }
}

/// Write one header line and one line per row; no rows gives an empty table.
#[cfg(feature = "serde")]
fn write_csv<R: Serialize>(rows: impl IntoIterator<Item = R>) -> SurrogateResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

#[cfg(feature = "serde")]
#[derive(Serialize)]
struct CoherenceRow {
    seed: u64,
    band_low: f64,
    band_high: f64,
    nperseg: usize,
    mode: String,
    null_mode: &'static str,
    n_null: usize,
    stat: Option<f64>,
    band_fraction: Option<f64>,
    p_value_flip: Option<f64>,
    p_value_phase: Option<f64>,
    p_value_shift: Option<f64>,
    p_value_final: Option<f64>,
    z_score_final: Option<f64>,
    decision: bool,
}

#[cfg(feature = "serde")]
#[derive(Serialize)]
struct HysteresisRow {
    sweep: String,
    mode: String,
    n_steps: usize,
    u_min: Option<f64>,
    u_max: Option<f64>,
    nperseg: usize,
    theta_up: Option<f64>,
    theta_down: Option<f64>,
    loop_area: Option<f64>,
}

#[cfg(feature = "serde")]
#[derive(Serialize)]
struct LongReturnRow {
    seed: u64,
    max_lag: usize,
    block_size: usize,
    n_null: usize,
    stat: Option<f64>,
    mean_acf: Option<f64>,
    p_value: Option<f64>,
    z_score: Option<f64>,
}

/// CSV with one row per coherence run.
///
/// Families that were not run and non-finite numbers leave the cell empty.
#[cfg(feature = "serde")]
pub fn coherence_csv(results: &[CoherenceTestResult]) -> SurrogateResult<String> {
    write_csv(results.iter().map(|r| CoherenceRow {
        seed: r.seed,
        band_low: r.band.low(),
        band_high: r.band.high(),
        nperseg: r.nperseg,
        mode: r.reduction.to_string(),
        null_mode: r.null_mode.as_str(),
        n_null: r.n_null,
        stat: finite(r.stat),
        band_fraction: finite(r.band_fraction),
        p_value_flip: r.p_value(NullFamily::Flip).and_then(finite),
        p_value_phase: r.p_value(NullFamily::Phase).and_then(finite),
        p_value_shift: r.p_value(NullFamily::Shift).and_then(finite),
        p_value_final: finite(r.p_value_final),
        z_score_final: finite(r.z_score_final),
        decision: r.decision_at_alpha,
    }))
}

/// CSV with one row per hysteresis sweep.
#[cfg(feature = "serde")]
pub fn hysteresis_csv(results: &[HysteresisResult]) -> SurrogateResult<String> {
    write_csv(results.iter().map(|r| HysteresisRow {
        sweep: r.sweep.to_string(),
        mode: r.reduction.to_string(),
        n_steps: r.u_grid.len(),
        u_min: r.u_grid.first().copied().and_then(finite),
        u_max: r.u_grid.last().copied().and_then(finite),
        nperseg: r.nperseg,
        theta_up: r.theta_up.and_then(finite),
        theta_down: r.theta_down.and_then(finite),
        loop_area: finite(r.loop_area),
    }))
}

/// CSV with one row per long-return run.
#[cfg(feature = "serde")]
pub fn long_return_csv(results: &[LongReturnResult]) -> SurrogateResult<String> {
    write_csv(results.iter().map(|r| LongReturnRow {
        seed: r.seed,
        max_lag: r.max_lag,
        block_size: r.block_size,
        n_null: r.n_null,
        stat: finite(r.stat),
        mean_acf: finite(r.mean_acf),
        p_value: finite(r.p_value),
        z_score: finite(r.z_score),
    }))
}

/// Plain-text report over all three test families.
pub fn render_report(
    tag: Option<&str>,
    coherence: &[CoherenceTestResult],
    hysteresis: &[HysteresisResult],
    long_return: &[LongReturnResult],
    alpha: f64,
) -> SurrogateResult<String> {
    let mut out = String::from("AGGREGATE REPORT");
    if let Some(tag) = tag {
        out.push_str(&format!("  tag={}", tag));
    }
    out.push('\n');

    if coherence.is_empty() {
        out.push_str("coherence: no runs\n");
    } else {
        let s = summarize_coherence(coherence, alpha)?;
        out.push_str(&format!("coherence  runs={}  p_value_final: {}\n", s.runs, s.p_value_final));
        out.push_str(&format!("     stat: {}\n", s.stat));
        out.push_str(&format!("     significant at {}: {}\n", alpha, s.significance_rate));
        if s.degenerate_runs > 0 {
            out.push_str(&format!("     empty-band runs: {}\n", s.degenerate_runs));
        }
        out.push_str(&format!("     seeds: {:?}\n", s.seeds));
    }

    if hysteresis.is_empty() {
        out.push_str("hysteresis: no runs\n");
    } else {
        let s = summarize_hysteresis(hysteresis);
        out.push_str(&format!("hysteresis runs={}  loop_area: {}\n", s.runs, s.loop_area));
        out.push_str(&format!("     theta_up: {}\n", s.theta_up));
        out.push_str(&format!("     theta_down: {}\n", s.theta_down));
    }

    if long_return.is_empty() {
        out.push_str("long-return: no runs\n");
    } else {
        let s = summarize_long_return(long_return, alpha)?;
        out.push_str(&format!("long-return runs={}  p_value: {}\n", s.runs, s.p_value));
        out.push_str(&format!("     stat: {}\n", s.stat));
        out.push_str(&format!("     significant at {}: {}\n", alpha, s.significance_rate));
        out.push_str(&format!("     seeds: {:?}\n", s.seeds));
    }

    Ok(out)
}
