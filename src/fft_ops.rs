//! FFT primitives for spectral estimation and surrogate generation.
//!
//! Plans are cached in a bounded LRU keyed by size and direction, because the
//! null loop transforms thousands of equally sized segments and planning is
//! the dominant cost for non power-of-two lengths.

use crate::errors::{SurrogateResult, SurrogateTestError};
use lru::LruCache;
use num_complex::Complex64;
use parking_lot::Mutex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::num::NonZeroUsize;
use std::sync::{Arc, LazyLock};

/// Cache key for FFT planners, distinguishing forward and inverse transforms
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct FftCacheKey {
    size: usize,
    is_forward: bool,
}

type FftPlanCache = LruCache<FftCacheKey, Arc<dyn Fft<f64>>>;

/// Maximum number of cached plans.
const MAX_CACHE_ENTRIES: usize = 64;
/// Maximum FFT size (2^24 points).
const MAX_FFT_SIZE: usize = 1 << 24;

static FFT_CACHE: LazyLock<Mutex<FftPlanCache>> = LazyLock::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(MAX_CACHE_ENTRIES).unwrap_or(NonZeroUsize::MIN),
    ))
});

fn get_cached_fft_plan(size: usize, is_forward: bool) -> SurrogateResult<Arc<dyn Fft<f64>>> {
    if size == 0 || size > MAX_FFT_SIZE {
        return Err(SurrogateTestError::FftError { size });
    }

    let key = FftCacheKey { size, is_forward };
    let mut cache = FFT_CACHE.lock();
    if let Some(plan) = cache.get(&key) {
        return Ok(Arc::clone(plan));
    }

    let mut planner = FftPlanner::new();
    let plan = if is_forward {
        planner.plan_fft_forward(size)
    } else {
        planner.plan_fft_inverse(size)
    };
    cache.put(key, Arc::clone(&plan));
    Ok(plan)
}

/// Cached forward FFT plan.
pub fn get_cached_fft_forward(size: usize) -> SurrogateResult<Arc<dyn Fft<f64>>> {
    get_cached_fft_plan(size, true)
}

/// Cached inverse FFT plan (unnormalized, as rustfft computes it).
pub fn get_cached_fft_inverse(size: usize) -> SurrogateResult<Arc<dyn Fft<f64>>> {
    get_cached_fft_plan(size, false)
}

/// Drop all cached plans.
pub fn clear_fft_cache() {
    FFT_CACHE.lock().clear();
}

/// Number of cached (forward, inverse) plans.
pub fn get_fft_cache_stats() -> (usize, usize) {
    let cache = FFT_CACHE.lock();
    cache.iter().fold((0, 0), |(fwd, inv), (key, _)| {
        if key.is_forward {
            (fwd + 1, inv)
        } else {
            (fwd, inv + 1)
        }
    })
}

/// Subtract the mean from a segment ("constant" detrend).
pub fn detrend_constant(data: &[f64]) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    data.iter().map(|&x| x - mean).collect()
}

/// Periodic Hann window of length `n`.
///
/// `w[i] = 0.5 - 0.5 cos(2πi/n)`, the DFT-even form used for spectral
/// estimation (as opposed to the symmetric `n - 1` denominator used for
/// filter design).
pub fn hann_window(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
            .collect(),
    }
}

/// One-sided spectrum of a real signal: bins `0..=n/2`.
pub fn rfft(data: &[f64]) -> SurrogateResult<Vec<Complex64>> {
    let n = data.len();
    let fft = get_cached_fft_forward(n)?;
    let mut buffer: Vec<Complex64> = data.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    fft.process(&mut buffer);
    buffer.truncate(n / 2 + 1);
    Ok(buffer)
}

/// Inverse of [`rfft`] for a real signal of length `n`.
///
/// The negative-frequency half is rebuilt by Hermitian symmetry. Imaginary
/// parts of the DC bin (and the Nyquist bin for even `n`) are discarded, so
/// the output is always real.
pub fn irfft(spectrum: &[Complex64], n: usize) -> SurrogateResult<Vec<f64>> {
    if spectrum.len() != n / 2 + 1 {
        return Err(SurrogateTestError::invalid(
            "spectrum_length",
            spectrum.len() as f64,
            format!("must equal n/2 + 1 = {} for n = {}", n / 2 + 1, n),
        ));
    }
    let ifft = get_cached_fft_inverse(n)?;

    let mut buffer = vec![Complex64::new(0.0, 0.0); n];
    buffer[..spectrum.len()].copy_from_slice(spectrum);
    for k in 1..spectrum.len() {
        if n - k > k {
            buffer[n - k] = spectrum[k].conj();
        }
    }
    buffer[0] = Complex64::new(buffer[0].re, 0.0);
    if n % 2 == 0 {
        buffer[n / 2] = Complex64::new(buffer[n / 2].re, 0.0);
    }

    ifft.process(&mut buffer);
    let scale = 1.0 / n as f64;
    Ok(buffer.iter().map(|c| c.re * scale).collect())
}

/// Frequencies of the one-sided spectrum for a length `n` transform at rate `fs`.
pub fn rfft_frequencies(n: usize, fs: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * fs / n as f64).collect()
}
