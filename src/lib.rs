//! # Surrogate Coherence Tests
//!
//! Surrogate-based hypothesis tests for coupling between two equally sampled
//! time series, plus two companion diagnostics.
//!
//! The central question is whether the Welch magnitude-squared coherence of a
//! series pair, reduced over a frequency band, is larger than what the pair's
//! own spectra would produce without coupling. The null distribution comes
//! from surrogate pairs that keep the marginal spectra and destroy the
//! cross-series alignment.
//!
//! ## Key Features
//!
//! - **Welch Coherence**: periodic Hann window, half overlap, constant detrend,
//!   automatic or fixed segment lengths
//! - **Three Null Families**: sign flip with circular shift, Fourier phase
//!   randomization, plain circular shift; combined conservatively
//! - **Deterministic Draws**: every surrogate draw has its own seeded ChaCha20
//!   substream, so results match with or without the `parallel` feature
//! - **Hysteresis Sweeps**: forward/backward band-edge sweeps with loop area
//!   and threshold crossings
//! - **Long-Return Test**: tail autocorrelation against a block-permutation null
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use surrogate_coherence::generators::{coupled_narrowband_pair, CoupledPairConfig, GeneratorConfig};
//! use surrogate_coherence::{run_coherence_test, CoherenceTestConfig, NullModel};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (x, y) = coupled_narrowband_pair(&GeneratorConfig::default(), &CoupledPairConfig::default())?;
//!
//!     let config = CoherenceTestConfig::builder()
//!         .null_model(NullModel::All)
//!         .n_null(199)
//!         .seed(7)
//!         .build()?;
//!     let result = run_coherence_test(&x, &y, &config)?;
//!
//!     println!("band coherence = {:.3}, p = {:.4}", result.stat, result.p_value_final);
//!     for outcome in &result.families {
//!         println!("  {}: p = {:.4}, z = {:.2}", outcome.family, outcome.p_value, outcome.z_score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): fan out surrogate draws with rayon
//! - `serde`: `Serialize`/`Deserialize` on configs and results, JSON records,
//!   CSV summary tables
//! - `cli`: the `surrogate-tests` binary
//! - `slow_tests`: full-size integration scenarios

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod fft_ops;
pub mod math_utils;
pub mod results;
pub mod secure_rng;

// Estimators and tests
pub mod band;
pub mod hysteresis;
pub mod long_return;
pub mod significance;
pub mod spectral;
pub mod surrogates;

// Data generation and reporting
pub mod generators;
#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub mod records;
pub mod summary;

// Re-exports for convenience - main public API
pub use config::{
    CoherenceTestConfig, CoherenceTestConfigBuilder, CrossingDetector, HysteresisConfig,
    LongReturnConfig, SweepTarget, DEFAULT_ALPHA,
};
pub use errors::{SurrogateResult, SurrogateTestError};
pub use results::{
    CoherenceTestResult, FamilyOutcome, HysteresisResult, LongReturnResult, NullDistribution,
};

// Spectral estimation exports
pub use band::{band_coherence, band_statistic, BandStatistic, FrequencyBand, ReductionMode};
pub use spectral::{coherence_curve, welch_cross_spectra, CoherenceCurve, CrossSpectra, SegmentPolicy};

// Surrogate and test exports
pub use hysteresis::{detect_crossing, sweep_hysteresis};
pub use long_return::{autocorrelation, block_permute, run_long_return_test, tail_mean_acf};
pub use significance::{run_coherence_test, TestPhase};
pub use surrogates::{
    circular_shift_surrogate, flip_shift_surrogate, generate_surrogate_pair, phase_randomize,
    phase_surrogate, NullFamily, NullModel, SurrogateConfig,
};

pub use secure_rng::SecureRng;

#[cfg(feature = "serde")]
pub use records::ResultRecord;
pub use summary::{CoherenceSummary, HysteresisSummary, LongReturnSummary, SummaryStats};
