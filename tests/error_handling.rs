//! Integration tests for configuration and input errors
//!
//! Bad configurations must abort before any surrogate is drawn; degenerate
//! numerical situations must not be errors at all.

use surrogate_coherence::errors::SurrogateTestError;
use surrogate_coherence::generators::{white_noise_pair, GeneratorConfig};
use surrogate_coherence::{
    band_coherence, run_coherence_test, run_long_return_test, sweep_hysteresis,
    CoherenceTestConfig, FrequencyBand, HysteresisConfig, LongReturnConfig, NullModel,
    ReductionMode, SegmentPolicy,
};

fn pair(length: usize) -> (Vec<f64>, Vec<f64>) {
    white_noise_pair(&GeneratorConfig {
        length,
        seed: 1,
        ..GeneratorConfig::default()
    })
    .unwrap()
}

#[test]
fn test_invalid_bands_are_rejected() {
    for (low, high) in [(0.9, 0.7), (0.0, 0.5), (-1.0, 1.0), (0.5, 0.5), (f64::NAN, 1.0)] {
        let err = FrequencyBand::new(low, high).unwrap_err();
        assert!(err.is_invalid_parameter(), "({}, {}) gave {:?}", low, high, err);
    }
    assert!(FrequencyBand::try_from((0.7, 0.9)).is_ok());
}

#[test]
fn test_builder_rejects_bad_settings() {
    assert!(CoherenceTestConfig::builder().n_null(0).build().is_err());
    assert!(CoherenceTestConfig::builder().alpha(1.0).build().is_err());
    assert!(CoherenceTestConfig::builder().fs(0.0).build().is_err());
    assert!(CoherenceTestConfig::builder().shift_min_frac(0.5).build().is_err());
    assert!(CoherenceTestConfig::builder()
        .reduction(ReductionMode::TrimmedMean { trim: 0.6 })
        .build()
        .is_err());
    assert!(CoherenceTestConfig::builder()
        .segment_policy(SegmentPolicy::Fixed(4))
        .build()
        .is_err());
}

#[test]
fn test_segment_longer_than_series_is_rejected() {
    let (x, y) = pair(1000);
    let config = CoherenceTestConfig {
        segment_policy: SegmentPolicy::Fixed(2048),
        ..CoherenceTestConfig::quick()
    };
    match run_coherence_test(&x, &y, &config) {
        Err(SurrogateTestError::InvalidParameter { parameter, .. }) => {
            assert_eq!(parameter, "nperseg");
        }
        other => panic!("Expected InvalidParameter error, got {:?}", other),
    }
}

#[test]
fn test_mismatched_and_non_finite_series() {
    let (x, y) = pair(1000);
    let config = CoherenceTestConfig::quick();

    let err = run_coherence_test(&x, &y[..999], &config).unwrap_err();
    assert!(err.is_invalid_parameter());

    let mut bad = x.clone();
    bad[10] = f64::INFINITY;
    assert!(matches!(
        run_coherence_test(&bad, &y, &config),
        Err(SurrogateTestError::NumericalError { .. })
    ));
}

#[test]
fn test_auto_policy_on_short_series() {
    // 200 samples: the 128 floor fits, 10 samples cannot hold any segment.
    let (x, y) = pair(200);
    let config = CoherenceTestConfig {
        n_null: 9,
        null_model: NullModel::Phase,
        ..CoherenceTestConfig::default()
    };
    let result = run_coherence_test(&x, &y, &config).unwrap();
    assert_eq!(result.nperseg, 128);

    let (x, y) = pair(10);
    assert!(run_coherence_test(&x, &y, &config)
        .unwrap_err()
        .is_invalid_parameter());
}

#[test]
fn test_zero_power_series_is_not_an_error() {
    let zeros = vec![0.0; 512];
    let band = FrequencyBand::new(0.7, 0.9).unwrap();
    let stat = band_coherence(&zeros, &zeros, 20.0, 128, &band, ReductionMode::Mean).unwrap();
    assert_eq!(stat.value, 0.0);
}

#[test]
fn test_sweep_and_long_return_validation() {
    let (x, y) = pair(400);
    let reversed = HysteresisConfig {
        u_min: 1.0,
        u_max: 0.5,
        ..HysteresisConfig::default()
    };
    assert!(sweep_hysteresis(&x, &y, &reversed).unwrap_err().is_invalid_parameter());

    let one_step = HysteresisConfig {
        n_steps: 1,
        ..HysteresisConfig::default()
    };
    assert!(sweep_hysteresis(&x, &y, &one_step).is_err());

    let negative_noise = HysteresisConfig {
        noise: -0.1,
        ..HysteresisConfig::default()
    };
    assert!(sweep_hysteresis(&x, &y, &negative_noise).is_err());

    let zero_block = LongReturnConfig {
        block_size: Some(0),
        ..LongReturnConfig::quick()
    };
    assert!(run_long_return_test(&x, &zero_block).unwrap_err().is_invalid_parameter());

    match run_long_return_test(&x[..150], &LongReturnConfig::quick()) {
        Err(SurrogateTestError::InsufficientData { required, actual }) => {
            assert_eq!(required, 201);
            assert_eq!(actual, 150);
        }
        other => panic!("Expected InsufficientData error, got {:?}", other),
    }
}
