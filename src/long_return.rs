//! Long-range recurrence test for event and count series.
//!
//! The statistic is the mean autocorrelation over the tail half of lags
//! `max_lag/2 + 1 ..= max_lag` of the standardized series, so short-lag
//! clustering does not count towards it. The null shuffles contiguous blocks,
//! which keeps structure shorter than a block and destroys alignment at
//! longer lags.

use crate::config::LongReturnConfig;
use crate::errors::{validate_all_finite, SurrogateResult, SurrogateTestError};
use crate::fft_ops::{irfft, rfft};
use crate::math_utils::{empirical_p_value, mean, population_std, z_score, STD_EPSILON};
use crate::results::LongReturnResult;
use crate::secure_rng::SecureRng;
use crate::significance::collect_draws;
use num_complex::Complex64;

/// Substream of the block-permutation draws.
const BLOCK_PERMUTATION_STREAM: usize = 4;

/// Zero mean, unit population variance (`ε`-guarded).
pub fn standardize(data: &[f64]) -> Vec<f64> {
    let m = mean(data);
    let s = population_std(data) + STD_EPSILON;
    data.iter().map(|&v| (v - m) / s).collect()
}

/// Normalized autocorrelation at lags `1..=max_lag`.
///
/// `acf[lag - 1] = Σ x[t]·x[t + lag] / (n - lag)`, computed through a
/// zero-padded FFT.
pub fn autocorrelation(data: &[f64], max_lag: usize) -> SurrogateResult<Vec<f64>> {
    let n = data.len();
    if max_lag == 0 {
        return Err(SurrogateTestError::invalid("max_lag", 0.0, ">= 1"));
    }
    if n <= max_lag {
        return Err(SurrogateTestError::InsufficientData {
            required: max_lag + 1,
            actual: n,
        });
    }

    let size = (2 * n).next_power_of_two();
    let mut padded = data.to_vec();
    padded.resize(size, 0.0);

    let power: Vec<Complex64> = rfft(&padded)?
        .iter()
        .map(|c| Complex64::new(c.norm_sqr(), 0.0))
        .collect();
    let lagged_sums = irfft(&power, size)?;

    Ok((1..=max_lag)
        .map(|lag| lagged_sums[lag] / (n - lag) as f64)
        .collect())
}

/// Mean of `acf[acf.len()/2 ..]`.
pub fn tail_mean_acf(acf: &[f64]) -> f64 {
    mean(&acf[acf.len() / 2..])
}

/// Shuffle the order of consecutive `block`-sized chunks.
///
/// The last chunk may be shorter; the output always has the input length.
pub fn block_permute(data: &[f64], block: usize, rng: &mut SecureRng) -> Vec<f64> {
    let mut blocks: Vec<&[f64]> = data.chunks(block.max(1)).collect();
    rng.shuffle(&mut blocks);
    blocks.concat()
}

/// Run the long-return test on `series`.
///
/// # Errors
/// - `InvalidParameter` for a bad configuration
/// - `InsufficientData` when the series is not longer than `max_lag`
/// - `NumericalError` for non-finite samples
pub fn run_long_return_test(
    series: &[f64],
    config: &LongReturnConfig,
) -> SurrogateResult<LongReturnResult> {
    config.validate()?;
    validate_all_finite(series, "series")?;
    if series.len() <= config.max_lag {
        return Err(SurrogateTestError::InsufficientData {
            required: config.max_lag + 1,
            actual: series.len(),
        });
    }

    let standardized = standardize(series);
    let acf = autocorrelation(&standardized, config.max_lag)?;
    let stat = tail_mean_acf(&acf);
    let block_size = config.effective_block_size();

    log::debug!(
        "long-return test: n = {}, max_lag = {}, block = {}, n_null = {}",
        series.len(),
        config.max_lag,
        block_size,
        config.n_null
    );

    let null = collect_draws(config.n_null, config.parallel, |draw| {
        let mut rng = SecureRng::for_draw(config.seed, BLOCK_PERMUTATION_STREAM, draw);
        let permuted = block_permute(&standardized, block_size, &mut rng);
        Ok(tail_mean_acf(&autocorrelation(&permuted, config.max_lag)?))
    })?;

    let p_value = empirical_p_value(stat, &null);
    log::info!(
        "long-return test: tail mean acf = {:.5}, p = {:.4}",
        stat,
        p_value
    );

    Ok(LongReturnResult {
        stat,
        p_value,
        z_score: z_score(stat, &null),
        mean_acf: mean(&acf),
        max_lag: config.max_lag,
        block_size,
        n_null: config.n_null,
        seed: config.seed,
    })
}
