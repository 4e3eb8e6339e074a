//! Report types
//!
//! Everything a comprehensive run returns. Field names on the wire are
//! camelCase inside the blocks and snake_case at the top level.

use maac_core::MethodResult;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

/// Success rate at or above which a run can be publication ready
pub const READY_SUCCESS_RATE: f64 = 0.8;
/// Completeness at or above which a run can be publication ready
pub const READY_COMPLETENESS: f64 = 0.9;
/// Completeness above which variance is considered adequate
pub const ADEQUATE_COMPLETENESS: f64 = 0.8;

// ============ Per-method outcomes ============

/// One method's outcome inside a family map
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MethodOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub result: MethodResult,
}

impl From<MethodResult> for MethodOutcome {
    fn from(result: MethodResult) -> Self {
        Self {
            success: result.valid,
            error: result.error.clone(),
            result,
        }
    }
}

/// Method outcomes keyed by entry name, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyResults {
    entries: Vec<(String, MethodOutcome)>,
}

impl FamilyResults {
    pub fn insert(&mut self, key: impl Into<String>, outcome: MethodOutcome) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = outcome,
            None => self.entries.push((key, outcome)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MethodOutcome> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, o)| o)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FamilyResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Method outcomes grouped the way the report presents them
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodResults {
    pub descriptive_statistics: FamilyResults,
    pub correlational_analysis: FamilyResults,
    pub testing_procedures: FamilyResults,
    pub specialized_analyses: FamilyResults,
}

// ============ Tally ============

/// Attempted / succeeded / failed counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionTally {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ExecutionTally {
    pub fn record(&mut self, result: &MethodResult) {
        self.attempted += 1;
        if result.valid {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// `succeeded / attempted`, 0 when nothing was attempted
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

// ============ Advanced blocks ============

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StatisticalTables {
    #[serde(rename = "correlationMatrix")]
    pub correlation_matrix: JsonValue,
    #[serde(rename = "correlationColumns")]
    pub correlation_columns: JsonValue,
}

impl Default for StatisticalTables {
    fn default() -> Self {
        Self {
            correlation_matrix: JsonValue::Array(Vec::new()),
            correlation_columns: JsonValue::Array(Vec::new()),
        }
    }
}

/// Payloads of the factor-analytic methods that succeeded
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct FactorAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pca: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efa: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kmo: Option<JsonValue>,
}

impl FactorAnalysis {
    pub fn is_empty(&self) -> bool {
        self.pca.is_none() && self.efa.is_none() && self.kmo.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityAnalysis {
    pub cronbachs_alpha: Option<f64>,
    pub alpha_interpretation: Option<String>,
    pub n_items: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapAnalysis {
    pub mean: Option<f64>,
    pub confidence_interval: [Option<f64>; 2],
    pub standard_error: Option<f64>,
    pub n_iterations: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerAnalysis {
    pub statistical_power: Option<f64>,
    pub effect_size: f64,
    pub sample_size: usize,
    pub alpha: f64,
}

// ============ Quality synthesis ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MethodCoverage {
    pub successful: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub completeness_rate: f64,
    pub variance_adequacy: &'static str,
    pub method_coverage: MethodCoverage,
}

impl DataQuality {
    pub fn new(completeness: f64, tally: &ExecutionTally) -> Self {
        Self {
            completeness_rate: completeness,
            variance_adequacy: if completeness > ADEQUATE_COMPLETENESS {
                "adequate"
            } else {
                "inadequate"
            },
            method_coverage: MethodCoverage {
                successful: tally.succeeded,
                total: tally.attempted,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub total_methods_attempted: usize,
    pub successful_methods: usize,
    pub failed_methods: usize,
    /// Fraction in [0, 1]
    pub success_rate: f64,
}

impl From<&ExecutionTally> for ExecutionSummary {
    fn from(tally: &ExecutionTally) -> Self {
        Self {
            total_methods_attempted: tally.attempted,
            successful_methods: tally.succeeded,
            failed_methods: tally.failed,
            success_rate: tally.success_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NeedsImprovement,
}

impl Readiness {
    /// Fixed thresholds: success rate ≥ 0.8 and completeness ≥ 0.9
    pub fn assess(success_rate: f64, completeness: f64) -> Self {
        if success_rate >= READY_SUCCESS_RATE && completeness >= READY_COMPLETENESS {
            Readiness::Ready
        } else {
            Readiness::NeedsImprovement
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFindings {
    pub reliability: String,
    pub sample_size: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicCredibility {
    pub completeness_score: f64,
    pub publication_readiness: Readiness,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSummary {
    pub key_findings: KeyFindings,
    pub academic_credibility: AcademicCredibility,
}

// ============ Report ============

/// Terminal artifact of a comprehensive run
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ComprehensiveReport {
    pub session_id: String,
    pub engine_version: &'static str,
    pub analysis_timestamp: String,
    pub experiments_analyzed: usize,

    pub method_results: MethodResults,
    pub statistical_tables: StatisticalTables,

    /// Present only when the factor gate held and at least one method succeeded
    pub factor_analysis: Option<FactorAnalysis>,
    pub reliability_analysis: Option<ReliabilityAnalysis>,
    pub bootstrap_analysis: Option<BootstrapAnalysis>,
    pub power_analysis: Option<PowerAnalysis>,

    pub data_quality: DataQuality,
    pub execution_summary: ExecutionSummary,
    pub integration_summary: IntegrationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use maac_core::StatError;
    use serde_json::json;

    #[test]
    fn test_tally_success_rate() {
        let mut tally = ExecutionTally::default();
        assert_eq!(tally.success_rate(), 0.0);
        tally.record(&MethodResult::ok());
        tally.record(&MethodResult::failed(&StatError::degenerate("flat")));
        assert_eq!(tally, ExecutionTally { attempted: 2, succeeded: 1, failed: 1 });
        assert_eq!(tally.success_rate(), 0.5);
    }

    #[test]
    fn test_readiness_thresholds() {
        assert_eq!(Readiness::assess(0.8, 0.9), Readiness::Ready);
        assert_eq!(Readiness::assess(0.79, 1.0), Readiness::NeedsImprovement);
        assert_eq!(Readiness::assess(1.0, 0.89), Readiness::NeedsImprovement);
        assert_eq!(serde_json::to_value(Readiness::NeedsImprovement).unwrap(), json!("needs_improvement"));
    }

    #[test]
    fn test_family_results_keep_order() {
        let mut family = FamilyResults::default();
        family.insert("median", MethodResult::ok().into());
        family.insert("mean", MethodResult::ok().into());
        let v = serde_json::to_value(&family).unwrap();
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["median", "mean"]);
    }

    #[test]
    fn test_failed_outcome_carries_error() {
        let outcome: MethodOutcome = MethodResult::failed(&StatError::too_few("mean", 1, 0)).into();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("at least 1"));
    }

    #[test]
    fn test_data_quality_adequacy() {
        let tally = ExecutionTally { attempted: 4, succeeded: 3, failed: 1 };
        let q = DataQuality::new(0.8, &tally);
        assert_eq!(q.variance_adequacy, "inadequate");
        assert_eq!(q.method_coverage, MethodCoverage { successful: 3, total: 4 });
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["methodCoverage"], json!({"successful": 3, "total": 4}));
    }
}
