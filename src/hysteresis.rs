//! Forward/backward band sweeps and hysteresis loop metrics.
//!
//! The band statistic is evaluated on a fixed series pair at each point of an
//! ascending parameter grid, then again with the grid traversed in descending
//! order. Without observation noise both passes see identical inputs, so any
//! loop area measures order sensitivity of the evaluation itself.

use crate::band::band_statistic;
use crate::config::{CrossingDetector, HysteresisConfig};
use crate::errors::{validate_all_finite, validate_equal_length, SurrogateResult};
use crate::math_utils::{linspace, trapezoid};
use crate::results::HysteresisResult;
use crate::secure_rng::SecureRng;
use crate::spectral::{coherence_curve, CoherenceCurve};

/// Curves whose range is below this are treated as flat.
const FLAT_TOLERANCE: f64 = 1e-12;

/// Sweep the configured band parameter up and back down over `x` and `y`.
///
/// Grid points that map to an empty or inverted band evaluate to 0, like a
/// band with no bins.
pub fn sweep_hysteresis(
    x: &[f64],
    y: &[f64],
    config: &HysteresisConfig,
) -> SurrogateResult<HysteresisResult> {
    config.validate()?;
    validate_equal_length(x, y)?;
    validate_all_finite(x, "x")?;
    validate_all_finite(y, "y")?;
    let nperseg = config
        .segment_policy
        .resolve(x.len(), config.fs, &config.base_band)?;

    let u_grid = linspace(config.u_min, config.u_max, config.n_steps);
    let mut evaluator = SweepEvaluator::new(x, y, config, nperseg)?;

    let forward = u_grid
        .iter()
        .map(|&u| evaluator.evaluate(u))
        .collect::<SurrogateResult<Vec<f64>>>()?;
    let backward_trace = u_grid
        .iter()
        .rev()
        .map(|&u| evaluator.evaluate(u))
        .collect::<SurrogateResult<Vec<f64>>>()?;

    let backward: Vec<f64> = backward_trace.iter().rev().copied().collect();
    let gap: Vec<f64> = forward
        .iter()
        .zip(&backward)
        .map(|(f, b)| (f - b).abs())
        .collect();
    let loop_area = trapezoid(&gap, &u_grid);

    let descending: Vec<f64> = u_grid.iter().rev().copied().collect();
    let theta_up = detect_crossing(config.crossing, &u_grid, &forward);
    let theta_down = detect_crossing(config.crossing, &descending, &backward_trace);

    log::info!(
        "hysteresis sweep [{}] over {} points: loop area = {:.6}, theta_up = {:?}, theta_down = {:?}",
        config.sweep,
        u_grid.len(),
        loop_area,
        theta_up,
        theta_down
    );

    Ok(HysteresisResult {
        u_grid,
        forward,
        backward,
        backward_trace,
        loop_area,
        theta_up,
        theta_down,
        sweep: config.sweep,
        reduction: config.reduction,
        nperseg,
        base_band: config.base_band,
    })
}

/// Evaluates the band statistic at one grid value.
///
/// Without noise the coherence curve is computed once and reused; with noise
/// every evaluation draws fresh noise for both series from one generator.
struct SweepEvaluator<'a> {
    x: &'a [f64],
    y: &'a [f64],
    config: &'a HysteresisConfig,
    nperseg: usize,
    clean_curve: Option<CoherenceCurve>,
    rng: SecureRng,
}

impl<'a> SweepEvaluator<'a> {
    fn new(
        x: &'a [f64],
        y: &'a [f64],
        config: &'a HysteresisConfig,
        nperseg: usize,
    ) -> SurrogateResult<Self> {
        let clean_curve = if config.noise > 0.0 {
            None
        } else {
            Some(coherence_curve(x, y, config.fs, nperseg)?)
        };
        Ok(Self {
            x,
            y,
            config,
            nperseg,
            clean_curve,
            rng: SecureRng::with_seed(config.seed),
        })
    }

    fn evaluate(&mut self, u: f64) -> SurrogateResult<f64> {
        if let Some(curve) = &self.clean_curve {
            return Ok(self.reduce(curve, u));
        }
        let xn = add_noise(self.x, self.config.noise, &mut self.rng);
        let yn = add_noise(self.y, self.config.noise, &mut self.rng);
        let curve = coherence_curve(&xn, &yn, self.config.fs, self.nperseg)?;
        Ok(self.reduce(&curve, u))
    }

    fn reduce(&self, curve: &CoherenceCurve, u: f64) -> f64 {
        match self.config.sweep.band_at(&self.config.base_band, u) {
            Some(band) => band_statistic(curve, &band, self.config.reduction).value,
            None => {
                log::debug!("sweep value {} gives an empty band", u);
                0.0
            }
        }
    }
}

fn add_noise(data: &[f64], std: f64, rng: &mut SecureRng) -> Vec<f64> {
    data.iter().map(|&v| v + std * rng.standard_normal()).collect()
}

/// Locate the threshold point of a curve traversed in the given grid order.
///
/// `grid` and `values` are in traversal order. Returns `None` for a flat
/// curve or fewer than two points.
pub fn detect_crossing(detector: CrossingDetector, grid: &[f64], values: &[f64]) -> Option<f64> {
    let n = grid.len().min(values.len());
    if n < 2 {
        return None;
    }
    let values = &values[..n];

    match detector {
        CrossingDetector::Midpoint => {
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if hi - lo <= FLAT_TOLERANCE {
                return None;
            }
            let mid = 0.5 * (lo + hi);
            let start_below = values[0] < mid;
            values
                .iter()
                .position(|&v| if start_below { v >= mid } else { v <= mid })
                .map(|i| grid[i])
        }
        CrossingDetector::Gradient => {
            let mut best: Option<(usize, f64)> = None;
            for (i, pair) in values.windows(2).enumerate() {
                let step = (pair[1] - pair[0]).abs();
                if step > FLAT_TOLERANCE && best.map_or(true, |(_, b)| step > b) {
                    best = Some((i + 1, step));
                }
            }
            best.map(|(i, _)| grid[i])
        }
    }
}
