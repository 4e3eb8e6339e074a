//! MAAC Engine
//!
//! Turns a method registry into the two request surfaces:
//! - `Engine::batch`: explicit method calls, each isolated
//! - `Engine::comprehensive`: gated, ordered analysis of experiment records

mod batch;
mod extract;
mod orchestrator;
mod report;

pub use batch::{dispatch, BatchReport, CallOutcome, MethodCall};
pub use extract::{DimensionalDataset, GroupPartition, DIMENSIONS, OVERALL_SCORE};
pub use orchestrator::{Orchestrator, DESCRIPTIVE_METHODS, EFFECT_SIZE_METHODS};
pub use report::*;

use maac_core::StatError;
use maac_plugin::{CallContext, Family, MethodRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Caller-tunable knobs of a comprehensive run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Record field whose value partitions records into comparison groups
    pub group_field: String,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            group_field: "tier".to_string(),
        }
    }
}

/// Liveness probe payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub methods_available: usize,
}

/// Main engine: a shared read-only registry plus the base call context
#[derive(Clone)]
pub struct Engine {
    registry: Arc<MethodRegistry>,
    ctx: CallContext,
}

impl Engine {
    pub fn new(registry: Arc<MethodRegistry>, ctx: CallContext) -> Self {
        Self { registry, ctx }
    }

    /// Engine over the full method catalogue with a default context
    pub fn with_standard_methods() -> Self {
        Self::new(Arc::new(maac_methods::standard_registry()), CallContext::new())
    }

    pub fn with_context(mut self, ctx: CallContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn batch(&self, calls: &[MethodCall], session_id: &str) -> BatchReport {
        dispatch(&self.registry, &self.ctx, calls, session_id)
    }

    pub fn comprehensive(
        &self,
        records: &[JsonValue],
        session_id: &str,
        options: &AnalysisOptions,
    ) -> Result<ComprehensiveReport, StatError> {
        Orchestrator::new(&self.registry, &self.ctx, session_id).run(records, options)
    }

    /// Every callable method name, aliases included
    pub fn methods(&self) -> Vec<&str> {
        self.registry.list()
    }

    pub fn list_methods(&self, family: Option<Family>) -> JsonValue {
        self.registry.list_methods(family)
    }

    pub fn describe(&self, name: &str) -> Result<JsonValue, StatError> {
        self.registry.describe(name)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "healthy",
            version: ENGINE_VERSION,
            methods_available: self.registry.len(),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_standard_methods()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn engine() -> Engine {
        Engine::with_standard_methods().with_context(CallContext::new().with_seed(Some(42)))
    }

    fn calls(v: JsonValue) -> Vec<MethodCall> {
        serde_json::from_value(v).unwrap()
    }

    fn record(i: usize, tier: &str) -> JsonValue {
        let mut fields = Map::new();
        for (j, d) in DIMENSIONS.iter().enumerate() {
            fields.insert(d.to_string(), json!(1.0 + ((i * (j + 2) + 3 * j) % 9) as f64 / 2.0));
        }
        fields.insert(OVERALL_SCORE.into(), json!(2.0 + (i % 5) as f64 * 0.5));
        fields.insert("tier".into(), json!(tier));
        fields.insert("experiment_id".into(), json!(format!("exp-{}", i)));
        JsonValue::Object(fields)
    }

    #[test]
    fn test_batch_mean_end_to_end() {
        let report = engine().batch(&calls(json!([{"id": "a", "method": "mean", "params": {"X": [1, 2, 3, 4, 5]}}])), "s");
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["results"][0]["result"]["mean"], json!(3.0));
        assert_eq!(v["results"][0]["result"]["n"], json!(5));
        assert_eq!(v["results"][0]["result"]["valid"], json!(true));
        assert_eq!(v["session_id"], json!("s"));
    }

    #[test]
    fn test_batch_unknown_method_end_to_end() {
        let report = engine().batch(&calls(json!([{"id": "z", "method": "not_a_real_method", "params": {}}])), "s");
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["successful"], json!(0));
        assert_eq!(v["failed"], json!(1));
        assert_eq!(v["results"][0]["success"], json!(false));
        assert_eq!(v["results"][0]["result"], JsonValue::Null);
        assert!(v["results"][0]["error"].as_str().unwrap().to_lowercase().contains("unknown method"));
    }

    #[test]
    fn test_single_tier_skips_effect_size_without_counting() {
        let records: Vec<JsonValue> = (0..5).map(|i| record(i, "basic")).collect();
        let report = engine().comprehensive(&records, "c", &AnalysisOptions::default()).unwrap();
        for key in EFFECT_SIZE_METHODS {
            assert!(report.method_results.specialized_analyses.get(key).is_none());
        }
        // descriptive 12, pearson 9, matrix 1, shapiro 1, cronbach 1
        assert_eq!(report.execution_summary.total_methods_attempted, 24);

        let mut two_tiers = records.clone();
        two_tiers.push(record(5, "premium"));
        two_tiers.push(record(6, "premium"));
        let report = engine().comprehensive(&two_tiers, "c", &AnalysisOptions::default()).unwrap();
        assert_eq!(report.execution_summary.total_methods_attempted, 27);
    }

    #[test]
    fn test_full_records_are_complete() {
        let records: Vec<JsonValue> = (0..12).map(|i| record(i, if i < 6 { "a" } else { "b" })).collect();
        let report = engine().comprehensive(&records, "c", &AnalysisOptions::default()).unwrap();
        assert_eq!(report.data_quality.completeness_rate, 1.0);
        assert_eq!(report.experiments_analyzed, 12);
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["data_quality"]["completenessRate"], json!(1.0));
        assert_eq!(v["data_quality"]["varianceAdequacy"], json!("adequate"));
        assert_eq!(v["integration_summary"]["keyFindings"]["sampleSize"], json!("N = 12"));
    }

    #[test]
    fn test_custom_group_field() {
        let records: Vec<JsonValue> = (0..8)
            .map(|i| {
                let mut r = record(i, "same");
                r["arm"] = json!(if i % 2 == 0 { "control" } else { "treatment" });
                r
            })
            .collect();
        let options = AnalysisOptions { group_field: "arm".into() };
        let report = engine().comprehensive(&records, "c", &options).unwrap();
        assert!(report.method_results.specialized_analyses.get("cohens_d").is_some());
    }

    #[test]
    fn test_options_deserialize_with_default() {
        let options: AnalysisOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options.group_field, "tier");
    }

    #[test]
    fn test_health() {
        let health = engine().health();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, "4.0.0");
        assert_eq!(health.methods_available, engine().methods().len());
    }
}
