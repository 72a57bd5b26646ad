//! Welch spectral estimation and magnitude-squared coherence.
//!
//! Segments overlap by half a segment, are mean-detrended, weighted with a
//! periodic Hann window and transformed individually; periodograms are
//! averaged with one-sided density scaling. Coherence is
//! `|Pxy|² / (Pxx·Pyy + ε)` clipped to `[0, 1]`.

use crate::band::FrequencyBand;
use crate::errors::{
    validate_all_finite, validate_equal_length, SurrogateResult, SurrogateTestError,
};
use crate::fft_ops::{detrend_constant, get_cached_fft_forward, hann_window, rfft_frequencies};
use num_complex::Complex64;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Guard added to the coherence denominator.
pub const COHERENCE_EPSILON: f64 = 1e-12;

/// Smallest segment length the estimator accepts.
pub const MIN_NPERSEG: usize = 8;

/// Default floor for auto-selected segment lengths.
pub const DEFAULT_MIN_NPERSEG: usize = 128;

/// Default number of non-overlapping-equivalent segments targeted by the auto policy.
pub const DEFAULT_TARGET_SEGMENTS: usize = 6;

/// Frequency grid with one coherence value per bin.
///
/// Every coherence value lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoherenceCurve {
    /// Bin frequencies in Hz, `k·fs/nperseg` for `k = 0..=nperseg/2`
    pub frequencies: Vec<f64>,
    /// Magnitude-squared coherence per bin
    pub coherence: Vec<f64>,
}

impl CoherenceCurve {
    /// Number of frequency bins.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// True when the grid has no bins.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// Welch auto- and cross-spectra of a series pair.
#[derive(Debug, Clone)]
pub struct CrossSpectra {
    /// Bin frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Auto-spectral density of the first series
    pub pxx: Vec<f64>,
    /// Auto-spectral density of the second series
    pub pyy: Vec<f64>,
    /// Cross-spectral density `conj(X)·Y`
    pub pxy: Vec<Complex64>,
    /// Segment length used
    pub nperseg: usize,
    /// Number of averaged segments
    pub n_segments: usize,
}

impl CrossSpectra {
    /// Magnitude-squared coherence from these spectra.
    pub fn coherence(&self) -> CoherenceCurve {
        let coherence = self
            .pxx
            .iter()
            .zip(&self.pyy)
            .zip(&self.pxy)
            .map(|((&pxx, &pyy), pxy)| {
                let c = pxy.norm_sqr() / (pxx * pyy + COHERENCE_EPSILON);
                if c.is_nan() {
                    0.0
                } else {
                    c.clamp(0.0, 1.0)
                }
            })
            .collect();

        CoherenceCurve {
            frequencies: self.frequencies.clone(),
            coherence,
        }
    }
}

/// How the Welch segment length is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentPolicy {
    /// Use exactly this many samples per segment.
    Fixed(usize),
    /// Derive the length from the series length and band.
    Auto {
        /// Number of non-overlapping-equivalent segments to aim for
        target_segments: usize,
        /// Floor on the segment length
        min_nperseg: usize,
        /// Minimum number of frequency bins required inside the band
        min_bins: Option<usize>,
    },
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self::auto()
    }
}

impl fmt::Display for SegmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentPolicy::Fixed(n) => write!(f, "fixed({})", n),
            SegmentPolicy::Auto {
                target_segments,
                min_nperseg,
                min_bins,
            } => {
                write!(f, "auto(K={}, floor={}", target_segments, min_nperseg)?;
                if let Some(bins) = min_bins {
                    write!(f, ", min_bins={}", bins)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl SegmentPolicy {
    /// Auto policy with the default segment target and floor.
    pub fn auto() -> Self {
        SegmentPolicy::Auto {
            target_segments: DEFAULT_TARGET_SEGMENTS,
            min_nperseg: DEFAULT_MIN_NPERSEG,
            min_bins: None,
        }
    }

    /// Auto policy that additionally requires `min_bins` bins inside the band.
    pub fn auto_with_min_bins(min_bins: usize) -> Self {
        SegmentPolicy::Auto {
            target_segments: DEFAULT_TARGET_SEGMENTS,
            min_nperseg: DEFAULT_MIN_NPERSEG,
            min_bins: Some(min_bins),
        }
    }

    /// Map a `0` command-line value to the auto policy, anything else to `Fixed`.
    pub fn from_cli_value(nperseg: usize) -> Self {
        if nperseg == 0 {
            Self::auto()
        } else {
            SegmentPolicy::Fixed(nperseg)
        }
    }

    /// Resolve the segment length for a series of `n` samples at rate `fs`.
    ///
    /// The auto policy targets `n / target_segments` samples, floors at
    /// `min_nperseg`, rounds up to even, then doubles until the band holds
    /// `min_bins` bins. A floor that exceeds `n` falls back to the even part
    /// of `n / 2`. Doubling never goes past that half, so Welch always
    /// averages at least two segments; if the band is still short of
    /// `min_bins` a warning is logged.
    pub fn resolve(&self, n: usize, fs: f64, band: &FrequencyBand) -> SurrogateResult<usize> {
        let nperseg = match *self {
            SegmentPolicy::Fixed(nperseg) => {
                if nperseg < MIN_NPERSEG || nperseg > n {
                    return Err(SurrogateTestError::invalid(
                        "nperseg",
                        nperseg as f64,
                        format!("must lie in [{}, {}] (series length)", MIN_NPERSEG, n),
                    ));
                }
                nperseg
            }
            SegmentPolicy::Auto {
                target_segments,
                min_nperseg,
                min_bins,
            } => {
                if target_segments == 0 {
                    return Err(SurrogateTestError::invalid(
                        "target_segments",
                        0.0,
                        "must be positive",
                    ));
                }
                let half = even_floor(n / 2);

                let mut nperseg = min_nperseg.max(n / target_segments);
                if nperseg % 2 == 1 {
                    nperseg += 1;
                }
                if nperseg > n {
                    log::warn!(
                        "segment floor {} exceeds series length {}; falling back to {}",
                        nperseg,
                        n,
                        half
                    );
                    nperseg = half;
                }
                if nperseg < MIN_NPERSEG {
                    return Err(SurrogateTestError::invalid(
                        "series_length",
                        n as f64,
                        format!(
                            "too short for any usable segment (need at least {} samples)",
                            2 * MIN_NPERSEG
                        ),
                    ));
                }

                if let Some(min_bins) = min_bins {
                    while bins_in_band(band, fs, nperseg) < min_bins {
                        let doubled = nperseg.saturating_mul(2);
                        if doubled > half {
                            nperseg = nperseg.max(half);
                            log::warn!(
                                "cannot reach {} bins in band {} with n = {}; using nperseg = {} ({} bins)",
                                min_bins,
                                band,
                                n,
                                nperseg,
                                bins_in_band(band, fs, nperseg)
                            );
                            break;
                        }
                        nperseg = doubled;
                    }
                }

                nperseg
            }
        };

        log::debug!("segment policy {} resolved to nperseg = {} for n = {}", self, nperseg, n);
        Ok(nperseg)
    }
}

fn even_floor(v: usize) -> usize {
    v - v % 2
}

/// `floor(band_width / (fs / nperseg))`.
pub fn bins_in_band(band: &FrequencyBand, fs: f64, nperseg: usize) -> usize {
    let resolution = fs / nperseg as f64;
    (band.width() / resolution).floor() as usize
}

/// Welch auto- and cross-spectra with 50% overlap and constant detrending.
pub fn welch_cross_spectra(
    x: &[f64],
    y: &[f64],
    fs: f64,
    nperseg: usize,
) -> SurrogateResult<CrossSpectra> {
    validate_equal_length(x, y)?;
    if !(fs.is_finite() && fs > 0.0) {
        return Err(SurrogateTestError::invalid("fs", fs, "must be finite and > 0"));
    }
    let n = x.len();
    if nperseg < MIN_NPERSEG || nperseg > n {
        return Err(SurrogateTestError::invalid(
            "nperseg",
            nperseg as f64,
            format!("must lie in [{}, {}] (series length)", MIN_NPERSEG, n),
        ));
    }
    validate_all_finite(x, "x")?;
    validate_all_finite(y, "y")?;

    // noverlap < nperseg always holds since nperseg >= MIN_NPERSEG.
    let noverlap = nperseg / 2;
    let step = nperseg - noverlap;
    let n_segments = (n - nperseg) / step + 1;
    let n_bins = nperseg / 2 + 1;

    let window = hann_window(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * window_power);

    let fft = get_cached_fft_forward(nperseg)?;
    let mut x_buf = vec![Complex64::new(0.0, 0.0); nperseg];
    let mut y_buf = vec![Complex64::new(0.0, 0.0); nperseg];

    let mut pxx = vec![0.0; n_bins];
    let mut pyy = vec![0.0; n_bins];
    let mut pxy = vec![Complex64::new(0.0, 0.0); n_bins];

    for seg in 0..n_segments {
        let start = seg * step;
        let xs = detrend_constant(&x[start..start + nperseg]);
        let ys = detrend_constant(&y[start..start + nperseg]);
        for i in 0..nperseg {
            x_buf[i] = Complex64::new(xs[i] * window[i], 0.0);
            y_buf[i] = Complex64::new(ys[i] * window[i], 0.0);
        }
        fft.process(&mut x_buf);
        fft.process(&mut y_buf);

        for k in 0..n_bins {
            pxx[k] += x_buf[k].norm_sqr();
            pyy[k] += y_buf[k].norm_sqr();
            pxy[k] += x_buf[k].conj() * y_buf[k];
        }
    }

    // One-sided density: interior bins carry the folded negative frequencies.
    let last_doubled = if nperseg % 2 == 0 { n_bins - 1 } else { n_bins };
    let averaging = scale / n_segments as f64;
    for k in 0..n_bins {
        let fold = if k >= 1 && k < last_doubled { 2.0 } else { 1.0 };
        pxx[k] *= averaging * fold;
        pyy[k] *= averaging * fold;
        pxy[k] *= averaging * fold;
    }

    Ok(CrossSpectra {
        frequencies: rfft_frequencies(nperseg, fs),
        pxx,
        pyy,
        pxy,
        nperseg,
        n_segments,
    })
}

/// Magnitude-squared coherence curve of `x` and `y`.
pub fn coherence_curve(
    x: &[f64],
    y: &[f64],
    fs: f64,
    nperseg: usize,
) -> SurrogateResult<CoherenceCurve> {
    Ok(welch_cross_spectra(x, y, fs, nperseg)?.coherence())
}
