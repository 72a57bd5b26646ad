//! Persisted result envelopes.
//!
//! A record is one JSON object `{task, schema_version, params, result}`. The
//! `task` tag selects the test family and the schema tag pins the layout of
//! `params` and `result` for that family.

use crate::config::{CoherenceTestConfig, HysteresisConfig, LongReturnConfig};
use crate::errors::{SurrogateResult, SurrogateTestError};
use crate::results::{CoherenceTestResult, HysteresisResult, LongReturnResult};
use serde::{Deserialize, Serialize};

/// Schema tag of hysteresis records.
pub const HYSTERESIS_SCHEMA: &str = "hysteresis-v1";

/// Schema tag of long-return records.
pub const LONG_RETURN_SCHEMA: &str = "long-return-v1";

/// One persisted test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "kebab-case")]
pub enum ResultRecord {
    /// Band-coherence significance test
    Coherence {
        /// `coherence-<null model>-v1`
        schema_version: String,
        /// Configuration the test ran with
        params: CoherenceTestConfig,
        /// Test outcome
        result: CoherenceTestResult,
    },
    /// Forward/backward sweep
    Hysteresis {
        /// `hysteresis-v1`
        schema_version: String,
        /// Configuration the sweep ran with
        params: HysteresisConfig,
        /// Sweep outcome
        result: HysteresisResult,
    },
    /// Block-permutation recurrence test
    LongReturn {
        /// `long-return-v1`
        schema_version: String,
        /// Configuration the test ran with
        params: LongReturnConfig,
        /// Test outcome
        result: LongReturnResult,
    },
}

impl ResultRecord {
    /// Wrap a coherence run; the schema tag follows the null model.
    pub fn coherence(params: CoherenceTestConfig, result: CoherenceTestResult) -> Self {
        ResultRecord::Coherence {
            schema_version: params.null_model.schema_version().to_string(),
            params,
            result,
        }
    }

    /// Wrap a hysteresis sweep.
    pub fn hysteresis(params: HysteresisConfig, result: HysteresisResult) -> Self {
        ResultRecord::Hysteresis {
            schema_version: HYSTERESIS_SCHEMA.to_string(),
            params,
            result,
        }
    }

    /// Wrap a long-return run.
    pub fn long_return(params: LongReturnConfig, result: LongReturnResult) -> Self {
        ResultRecord::LongReturn {
            schema_version: LONG_RETURN_SCHEMA.to_string(),
            params,
            result,
        }
    }

    /// Task name as written to the `task` field.
    pub fn task(&self) -> &'static str {
        match self {
            ResultRecord::Coherence { .. } => "coherence",
            ResultRecord::Hysteresis { .. } => "hysteresis",
            ResultRecord::LongReturn { .. } => "long-return",
        }
    }

    /// Schema tag carried by the record.
    pub fn schema_version(&self) -> &str {
        match self {
            ResultRecord::Coherence { schema_version, .. }
            | ResultRecord::Hysteresis { schema_version, .. }
            | ResultRecord::LongReturn { schema_version, .. } => schema_version,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> SurrogateResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SurrogateTestError::SerializationError {
            format: format!("JSON: {}", e),
        })
    }

    /// Parse a record and check that its schema tag is one this crate writes.
    pub fn from_json(text: &str) -> SurrogateResult<Self> {
        let record: ResultRecord =
            serde_json::from_str(text).map_err(|e| SurrogateTestError::SerializationError {
                format: format!("JSON: {}", e),
            })?;
        let expected = match &record {
            ResultRecord::Coherence { params, .. } => params.null_model.schema_version(),
            ResultRecord::Hysteresis { .. } => HYSTERESIS_SCHEMA,
            ResultRecord::LongReturn { .. } => LONG_RETURN_SCHEMA,
        };
        if record.schema_version() != expected {
            return Err(SurrogateTestError::SerializationError {
                format: format!(
                    "JSON: unsupported schema '{}' for task '{}', expected '{}'",
                    record.schema_version(),
                    record.task(),
                    expected
                ),
            });
        }
        Ok(record)
    }
}

/// Results of a mixed record set, split by task.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// Coherence results in insertion order
    pub coherence: Vec<CoherenceTestResult>,
    /// Hysteresis results in insertion order
    pub hysteresis: Vec<HysteresisResult>,
    /// Long-return results in insertion order
    pub long_return: Vec<LongReturnResult>,
}

impl RecordSet {
    /// Add the result of `record`, dropping its params.
    pub fn push(&mut self, record: ResultRecord) {
        match record {
            ResultRecord::Coherence { result, .. } => self.coherence.push(result),
            ResultRecord::Hysteresis { result, .. } => self.hysteresis.push(result),
            ResultRecord::LongReturn { result, .. } => self.long_return.push(result),
        }
    }

    /// Total number of results.
    pub fn len(&self) -> usize {
        self.coherence.len() + self.hysteresis.len() + self.long_return.len()
    }

    /// True when no result is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<ResultRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = ResultRecord>>(iter: I) -> Self {
        let mut set = RecordSet::default();
        for record in iter {
            set.push(record);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{FrequencyBand, ReductionMode};
    use crate::config::SweepTarget;
    use crate::surrogates::NullModel;

    fn long_return_record() -> ResultRecord {
        let params = LongReturnConfig::quick();
        let result = LongReturnResult {
            stat: 0.012,
            p_value: 0.02,
            z_score: 3.1,
            mean_acf: 0.004,
            max_lag: params.max_lag,
            block_size: params.effective_block_size(),
            n_null: params.n_null,
            seed: params.seed,
        };
        ResultRecord::long_return(params, result)
    }

    #[test]
    fn test_task_tag_and_schema() {
        let record = long_return_record();
        let json = record.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["task"], "long-return");
        assert_eq!(value["schema_version"], "long-return-v1");
        assert_eq!(value["params"]["max_lag"], 200);
        assert_eq!(ResultRecord::from_json(&json).unwrap(), record);
    }

    #[test]
    fn test_hysteresis_record_round_trips() {
        let params = HysteresisConfig::quick();
        let result = HysteresisResult {
            u_grid: vec![0.5, 0.75, 1.0],
            forward: vec![0.9, 0.9, 0.0],
            backward: vec![0.9, 0.9, 0.0],
            backward_trace: vec![0.0, 0.9, 0.9],
            loop_area: 0.0,
            theta_up: Some(1.0),
            theta_down: None,
            sweep: SweepTarget::LowEdge,
            reduction: ReductionMode::TrimmedMean { trim: 0.1 },
            nperseg: 128,
            base_band: FrequencyBand::new(0.78, 0.82).unwrap(),
        };
        let record = ResultRecord::hysteresis(params, result);
        let back = ResultRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.schema_version(), HYSTERESIS_SCHEMA);
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let json = long_return_record()
            .to_json()
            .unwrap()
            .replace("long-return-v1", "long-return-v9");
        assert!(matches!(
            ResultRecord::from_json(&json),
            Err(SurrogateTestError::SerializationError { .. })
        ));
        assert!(ResultRecord::from_json("{\"task\": \"unknown\"}").is_err());
    }

    #[test]
    fn test_coherence_schema_follows_null_model() {
        let params = CoherenceTestConfig {
            null_model: NullModel::Both,
            ..CoherenceTestConfig::quick()
        };
        assert_eq!(params.null_model.schema_version(), "coherence-both-v1");
    }

    #[test]
    fn test_record_set_partitions_by_task() {
        let set: RecordSet = vec![long_return_record(), long_return_record()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.long_return.len(), 2);
        assert!(set.coherence.is_empty());
    }
}
