//! Surrogate significance test for band coherence.
//!
//! A test call walks a fixed sequence of phases:
//!
//! ```text
//! Setup -> Observe -> SurrogateLoop -> Combine -> Decide -> Done
//! ```
//!
//! Setup validates the configuration and resolves the segment length, so a
//! bad configuration aborts before any surrogate is drawn. Each null family
//! gets its own distribution of the same band statistic; with several
//! families the reported p-value is the largest per-family p-value.

use crate::band::{band_coherence, BandStatistic};
use crate::config::CoherenceTestConfig;
use crate::errors::{validate_all_finite, validate_equal_length, SurrogateResult};
use crate::math_utils::{empirical_p_value, z_score};
use crate::results::{null_moments, CoherenceTestResult, FamilyOutcome, NullDistribution};
use crate::secure_rng::SecureRng;
use crate::surrogates::{generate_surrogate_pair, NullFamily};
use std::fmt;

/// Phases of a single coherence test call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    /// Validate configuration and resolve the segment length
    Setup,
    /// Band statistic of the observed pair
    Observe,
    /// Null draws for every requested family
    SurrogateLoop,
    /// Per-family p-values and z-scores
    Combine,
    /// Conservative combination and threshold
    Decide,
    /// Result emitted
    Done,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestPhase::Setup => "setup",
            TestPhase::Observe => "observe",
            TestPhase::SurrogateLoop => "surrogate-loop",
            TestPhase::Combine => "combine",
            TestPhase::Decide => "decide",
            TestPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Evaluate `draw(i)` for `i in 0..n`, in parallel when requested and available.
///
/// Each draw must derive its randomness from `i` alone, so the output is the
/// same in either mode.
pub(crate) fn collect_draws<F>(n: usize, parallel: bool, draw: F) -> SurrogateResult<Vec<f64>>
where
    F: Fn(usize) -> SurrogateResult<f64> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        if parallel {
            use rayon::prelude::*;
            return (0..n).into_par_iter().map(&draw).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    (0..n).map(draw).collect()
}

/// Run a band-coherence significance test on `x` and `y`.
///
/// # Errors
/// - `InvalidParameter` for a bad configuration, mismatched lengths, or a
///   series too short for any segment
/// - `NumericalError` for non-finite samples
///
/// An empty band is not an error: the statistic and every null draw are 0
/// and the p-value is 1.
pub fn run_coherence_test(
    x: &[f64],
    y: &[f64],
    config: &CoherenceTestConfig,
) -> SurrogateResult<CoherenceTestResult> {
    CoherenceTester::new(x, y, config).run()
}

struct CoherenceTester<'a> {
    x: &'a [f64],
    y: &'a [f64],
    config: &'a CoherenceTestConfig,
    phase: TestPhase,
}

impl<'a> CoherenceTester<'a> {
    fn new(x: &'a [f64], y: &'a [f64], config: &'a CoherenceTestConfig) -> Self {
        Self {
            x,
            y,
            config,
            phase: TestPhase::Setup,
        }
    }

    fn advance(&mut self, next: TestPhase) {
        log::debug!("coherence test: {} -> {}", self.phase, next);
        self.phase = next;
    }

    fn run(mut self) -> SurrogateResult<CoherenceTestResult> {
        let config = self.config;

        config.validate()?;
        validate_equal_length(self.x, self.y)?;
        validate_all_finite(self.x, "x")?;
        validate_all_finite(self.y, "y")?;
        let nperseg = config
            .segment_policy
            .resolve(self.x.len(), config.fs, &config.band)?;

        self.advance(TestPhase::Observe);
        let observed = self.statistic(self.x, self.y, nperseg)?;
        if observed.is_empty_band() {
            log::warn!(
                "no frequency bin inside band {} at nperseg = {}; statistic is degenerate",
                config.band,
                nperseg
            );
        }

        self.advance(TestPhase::SurrogateLoop);
        let nulls = config
            .null_model
            .families()
            .iter()
            .map(|&family| self.null_distribution(family, nperseg))
            .collect::<SurrogateResult<Vec<_>>>()?;

        self.advance(TestPhase::Combine);
        let families: Vec<FamilyOutcome> = nulls
            .iter()
            .map(|null| {
                let (null_mean, null_std) = null_moments(&null.values);
                FamilyOutcome {
                    family: null.family,
                    p_value: empirical_p_value(observed.value, &null.values),
                    z_score: z_score(observed.value, &null.values),
                    null_mean,
                    null_std,
                    critical_value: null.critical_value(config.alpha),
                }
            })
            .collect();

        self.advance(TestPhase::Decide);
        let p_value_final = families
            .iter()
            .map(|f| f.p_value)
            .fold(f64::NEG_INFINITY, f64::max);
        let z_score_final = families
            .iter()
            .map(|f| f.z_score)
            .fold(f64::INFINITY, f64::min);
        let decision_at_alpha = p_value_final < config.alpha;

        self.advance(TestPhase::Done);
        log::info!(
            "coherence test [{}] band {}: stat = {:.4}, p = {:.4}, significant = {}",
            config.null_model,
            config.band,
            observed.value,
            p_value_final,
            decision_at_alpha
        );

        Ok(CoherenceTestResult {
            stat: observed.value,
            band_fraction: observed.band_fraction,
            n_bins: observed.n_bins,
            nperseg,
            band: config.band,
            reduction: config.reduction,
            null_mode: config.null_model,
            n_null: config.n_null,
            families,
            p_value_final,
            z_score_final,
            alpha: config.alpha,
            decision_at_alpha,
            seed: config.seed,
            null_distributions: nulls,
        })
    }

    fn statistic(&self, x: &[f64], y: &[f64], nperseg: usize) -> SurrogateResult<BandStatistic> {
        band_coherence(
            x,
            y,
            self.config.fs,
            nperseg,
            &self.config.band,
            self.config.reduction,
        )
    }

    fn null_distribution(
        &self,
        family: NullFamily,
        nperseg: usize,
    ) -> SurrogateResult<NullDistribution> {
        let config = self.config;
        log::debug!("drawing {} {} surrogates", config.n_null, family);

        let values = collect_draws(config.n_null, config.parallel, |draw| {
            let mut rng = SecureRng::for_draw(config.seed, family.stream(), draw);
            let (xs, ys) =
                generate_surrogate_pair(family, self.x, self.y, &config.surrogate, &mut rng)?;
            Ok(self.statistic(&xs, &ys, nperseg)?.value)
        })?;

        Ok(NullDistribution { family, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{FrequencyBand, ReductionMode};
    use crate::errors::SurrogateTestError;
    use crate::spectral::SegmentPolicy;
    use crate::surrogates::NullModel;
    use assert_approx_eq::assert_approx_eq;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = SecureRng::with_seed(seed);
        (0..n).map(|_| rng.standard_normal()).collect()
    }

    fn quick(null_model: NullModel, n_null: usize) -> CoherenceTestConfig {
        CoherenceTestConfig {
            null_model,
            n_null,
            ..CoherenceTestConfig::default()
        }
    }

    #[test]
    fn test_identical_series_are_significant_under_every_family() {
        let x = noise(2048, 1);
        let cfg = quick(NullModel::All, 49);
        let result = run_coherence_test(&x, &x, &cfg).unwrap();

        assert!(result.stat > 0.99);
        assert_eq!(result.families.len(), 3);
        for outcome in &result.families {
            assert_approx_eq!(outcome.p_value, 1.0 / 50.0);
            assert!(outcome.z_score > 3.0);
        }
        assert_approx_eq!(result.p_value_final, 1.0 / 50.0);
        assert!(result.decision_at_alpha);
    }

    #[test]
    fn test_combined_p_value_is_family_maximum() {
        let x = noise(2048, 3);
        let y = noise(2048, 4);
        let result = run_coherence_test(&x, &y, &quick(NullModel::All, 60)).unwrap();

        let max_p = result
            .families
            .iter()
            .map(|f| f.p_value)
            .fold(0.0, f64::max);
        let min_z = result
            .families
            .iter()
            .map(|f| f.z_score)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.p_value_final, max_p);
        assert_eq!(result.z_score_final, min_z);
        for outcome in &result.families {
            assert!(result.p_value_final >= outcome.p_value);
            assert!(outcome.p_value >= 1.0 / 61.0 && outcome.p_value <= 1.0);
        }
        assert_eq!(result.decision_at_alpha, result.p_value_final < 0.05);
    }

    #[test]
    fn test_single_family_reports_its_own_p_value() {
        let x = noise(1024, 5);
        let y = noise(1024, 6);
        for model in [NullModel::Flip, NullModel::Phase, NullModel::Shift] {
            let result = run_coherence_test(&x, &y, &quick(model, 30)).unwrap();
            assert_eq!(result.families.len(), 1);
            assert_eq!(result.p_value_final, result.families[0].p_value);
            assert_eq!(result.null_distributions[0].len(), 30);
        }
        let both = run_coherence_test(&x, &y, &quick(NullModel::Both, 30)).unwrap();
        assert!(both.p_value(NullFamily::Shift).is_none());
        assert!(both.p_value(NullFamily::Phase).is_some());
    }

    #[test]
    fn test_parallel_and_sequential_runs_agree() {
        let x = noise(1500, 7);
        let y = noise(1500, 8);
        let mut cfg = quick(NullModel::All, 40);
        cfg.seed = 123;
        cfg.parallel = true;
        let a = run_coherence_test(&x, &y, &cfg).unwrap();
        cfg.parallel = false;
        let b = run_coherence_test(&x, &y, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_null_draws() {
        let x = noise(1500, 9);
        let y = noise(1500, 10);
        let mut cfg = quick(NullModel::Phase, 20);
        let a = run_coherence_test(&x, &y, &cfg).unwrap();
        cfg.seed = 1;
        let b = run_coherence_test(&x, &y, &cfg).unwrap();
        assert_eq!(a.stat, b.stat);
        assert_ne!(a.null_distributions, b.null_distributions);
    }

    #[test]
    fn test_band_beyond_nyquist_is_degenerate() {
        let x = noise(1024, 11);
        let y = noise(1024, 12);
        let cfg = CoherenceTestConfig {
            band: FrequencyBand::new(15.0, 16.0).unwrap(),
            reduction: ReductionMode::Peak,
            ..quick(NullModel::All, 25)
        };
        let result = run_coherence_test(&x, &y, &cfg).unwrap();
        assert_eq!(result.stat, 0.0);
        assert_eq!(result.band_fraction, 0.0);
        assert!(result.is_degenerate());
        assert_eq!(result.p_value_final, 1.0);
        assert!(!result.decision_at_alpha);
    }

    #[test]
    fn test_setup_errors_abort_before_drawing() {
        let x = noise(512, 13);
        let short = noise(500, 14);
        assert!(run_coherence_test(&x, &short, &quick(NullModel::All, 10))
            .unwrap_err()
            .is_invalid_parameter());

        let tiny = noise(12, 15);
        assert!(run_coherence_test(&tiny, &tiny, &quick(NullModel::All, 10))
            .unwrap_err()
            .is_invalid_parameter());

        let fixed = CoherenceTestConfig {
            segment_policy: SegmentPolicy::Fixed(1024),
            ..quick(NullModel::Flip, 10)
        };
        assert!(run_coherence_test(&x, &x, &fixed)
            .unwrap_err()
            .is_invalid_parameter());

        let mut bad = x.clone();
        bad[100] = f64::INFINITY;
        assert!(matches!(
            run_coherence_test(&bad, &x, &quick(NullModel::All, 10)),
            Err(SurrogateTestError::NumericalError { .. })
        ));
    }

    #[test]
    fn test_collect_draws_modes_match() {
        let f = |i: usize| Ok((i as f64).sqrt());
        let a = collect_draws(100, true, f).unwrap();
        let b = collect_draws(100, false, f).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(TestPhase::SurrogateLoop.to_string(), "surrogate-loop");
        assert_eq!(TestPhase::Done.to_string(), "done");
    }
}
