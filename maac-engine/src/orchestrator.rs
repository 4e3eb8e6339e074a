//! Comprehensive orchestrator
//!
//! Runs the fixed analysis sequence over a `DimensionalDataset`:
//! descriptive, correlational, normality, effect size, reliability, factor
//! analysis, bootstrap, power, then synthesis. Every step has a data-shape
//! gate. A step whose gate fails is skipped and not counted; a method that
//! runs and fails is counted, recorded and the run carries on.

use crate::extract::{series_json, DimensionalDataset, GroupPartition};
use crate::report::*;
use crate::{AnalysisOptions, ENGINE_VERSION};
use maac_core::{MethodResult, StatError};
use maac_plugin::{CallContext, MethodRegistry, Params};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

/// Descriptive methods run against the primary series
pub const DESCRIPTIVE_METHODS: [&str; 12] = [
    "mean", "median", "std", "var", "sem", "minimum", "maximum", "range", "skew", "kurtosis", "iqr",
    "quantiles",
];

/// Effect sizes computed between the first two groups
pub const EFFECT_SIZE_METHODS: [&str; 3] = ["cohens_d", "hedges_g", "glass_delta"];

const BOOTSTRAP_ITERATIONS: u64 = 1000;
const FACTOR_MIN_ROWS: usize = 10;
const FACTOR_COUNT: u64 = 3;
const POWER_ALPHA: f64 = 0.05;
/// Standardized effect assumed when none was observed
const NOMINAL_EFFECT: f64 = 0.5;

/// One comprehensive run. Owns its tally and partial report; dropped once
/// the report is built.
pub struct Orchestrator<'a> {
    registry: &'a MethodRegistry,
    ctx: &'a CallContext,
    session_id: &'a str,
    tally: ExecutionTally,
    results: MethodResults,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a MethodRegistry, ctx: &'a CallContext, session_id: &'a str) -> Self {
        Self {
            registry,
            ctx,
            session_id,
            tally: ExecutionTally::default(),
            results: MethodResults::default(),
        }
    }

    /// Analyse `records` and build the report. Fails only on malformed
    /// records; method failures are absorbed into the report.
    pub fn run(mut self, records: &[JsonValue], options: &AnalysisOptions) -> Result<ComprehensiveReport, StatError> {
        let data = DimensionalDataset::extract(records)?;
        info!(
            session = self.session_id,
            records = data.n_records(),
            primary = data.primary().len(),
            dimensions = data.populated().len(),
            "comprehensive analysis started"
        );

        self.descriptive(&data);
        let correlation = self.correlational(&data);
        self.normality(&data);
        let effect = self.effect_sizes(records, &options.group_field);
        let reliability = self.reliability(&data);
        let factor_analysis = self.factor_analytic(&data);
        let bootstrap_analysis = self.bootstrap(&data);
        let power_analysis = self.power(&data, effect);

        let report = self.synthesize(
            &data,
            correlation,
            factor_analysis,
            reliability,
            bootstrap_analysis,
            power_analysis,
        );
        info!(
            session = report.session_id.as_str(),
            attempted = report.execution_summary.total_methods_attempted,
            successful = report.execution_summary.successful_methods,
            failed = report.execution_summary.failed_methods,
            "comprehensive analysis finished"
        );
        Ok(report)
    }

    /// Call one method, count it and log the outcome
    fn attempt(&mut self, method: &str, params: JsonValue) -> MethodResult {
        let params: Params = match params {
            JsonValue::Object(map) => map,
            _ => Params::new(),
        };
        let result = self.registry.call(method, &params, self.ctx);
        self.tally.record(&result);
        if result.valid {
            debug!(session = self.session_id, method, "method succeeded");
        } else {
            warn!(
                session = self.session_id,
                method,
                error = result.error.as_deref().unwrap_or(""),
                "method failed"
            );
        }
        result
    }

    // ============ Steps ============

    fn descriptive(&mut self, data: &DimensionalDataset) {
        if data.primary().is_empty() {
            return;
        }
        let x = series_json(data.primary());
        for method in DESCRIPTIVE_METHODS {
            let result = self.attempt(method, json!({ "X": x }));
            self.results.descriptive_statistics.insert(method, result.into());
        }
    }

    /// Pearson of every long-enough dimension against the primary series,
    /// then one matrix across all populated dimensions. Returns the matrix
    /// result when it was attempted.
    fn correlational(&mut self, data: &DimensionalDataset) -> Option<MethodResult> {
        let primary = data.primary();
        if primary.len() > 2 {
            let x = series_json(primary);
            for (dim, values) in data.populated() {
                if values.len() < primary.len() {
                    continue;
                }
                let y = series_json(&values.truncated(primary.len()));
                let result = self.attempt("pearson", json!({ "X": x, "Y": y }));
                self.results
                    .correlational_analysis
                    .insert(format!("pearson_{}", dim), result.into());
            }
        }

        if data.populated().len() < 2 {
            return None;
        }
        let result = self.attempt("correlation_matrix", json!({ "data": data.common_table() }));
        self.results
            .correlational_analysis
            .insert("correlation_matrix", result.clone().into());
        Some(result)
    }

    fn normality(&mut self, data: &DimensionalDataset) {
        if data.primary().len() < 3 {
            return;
        }
        let result = self.attempt("shapiro_wilk", json!({ "X": series_json(data.primary()) }));
        self.results.testing_procedures.insert("shapiro_wilk", result.into());
    }

    /// Effect sizes between the first two groups in first-occurrence order.
    /// Returns Cohen's d when it was computed.
    fn effect_sizes(&mut self, records: &[JsonValue], group_field: &str) -> Option<f64> {
        let groups = GroupPartition::from_records(records, group_field);
        let Some((a, b)) = groups.first_pair(2) else {
            debug!(session = self.session_id, groups = groups.len(), "effect sizes skipped");
            return None;
        };
        debug!(session = self.session_id, first = a.0.as_str(), second = b.0.as_str(), "comparing groups");

        let params = json!({ "X": series_json(&a.1), "Y": series_json(&b.1) });
        let mut cohens_d = None;
        for method in EFFECT_SIZE_METHODS {
            let result = self.attempt(method, params.clone());
            if method == "cohens_d" {
                cohens_d = result.get_f64("cohens_d");
            }
            self.results.specialized_analyses.insert(method, result.into());
        }
        cohens_d
    }

    fn reliability(&mut self, data: &DimensionalDataset) -> Option<ReliabilityAnalysis> {
        if data.populated().len() < 2 {
            return None;
        }
        let result = self.attempt("cronbach_alpha", json!({ "data": data.common_table() }));
        let block = ReliabilityAnalysis {
            cronbachs_alpha: result.get_f64("alpha"),
            alpha_interpretation: result.get_str("interpretation").map(str::to_string),
            n_items: result.get_f64("n_items").map_or(0, |n| n as usize),
        };
        self.results.specialized_analyses.insert("cronbach_alpha", result.into());
        Some(block)
    }

    /// PCA, EFA and KMO in order; each is independent of the others
    fn factor_analytic(&mut self, data: &DimensionalDataset) -> Option<FactorAnalysis> {
        let populated = data.populated();
        if populated.len() < 3 || populated.iter().any(|(_, s)| s.len() < FACTOR_MIN_ROWS) {
            return None;
        }
        let table = data.common_table();

        let pca = self.attempt("pca", json!({ "data": table }));
        let efa = self.attempt("efa", json!({ "data": table, "n_factors": FACTOR_COUNT }));
        let kmo = self.attempt("kmo", json!({ "data": table }));

        let block = FactorAnalysis {
            pca: pca.valid.then(|| pca.payload_json()),
            efa: efa.valid.then(|| efa.payload_json()),
            kmo: kmo.valid.then(|| kmo.payload_json()),
        };
        for (name, result) in [("pca", pca), ("efa", efa), ("kmo", kmo)] {
            self.results.specialized_analyses.insert(name, result.into());
        }
        (!block.is_empty()).then_some(block)
    }

    fn bootstrap(&mut self, data: &DimensionalDataset) -> Option<BootstrapAnalysis> {
        if data.primary().len() < 10 {
            return None;
        }
        let result = self.attempt(
            "bootstrap_ci",
            json!({ "X": series_json(data.primary()), "n_iterations": BOOTSTRAP_ITERATIONS }),
        );
        let block = result.valid.then(|| BootstrapAnalysis {
            mean: result.get_f64("estimate"),
            confidence_interval: [result.get_f64("ci_lower"), result.get_f64("ci_upper")],
            standard_error: result.get_f64("se"),
            n_iterations: result.get("n_iterations").and_then(JsonValue::as_u64),
        });
        self.results.specialized_analyses.insert("bootstrap_ci", result.into());
        block
    }

    /// Achieved power at the observed sample size, using the observed
    /// Cohen's d or the nominal effect when none (or zero) was observed
    fn power(&mut self, data: &DimensionalDataset, observed: Option<f64>) -> Option<PowerAnalysis> {
        let n = data.primary().len();
        if n < 10 {
            return None;
        }
        let effect = observed.filter(|d| *d != 0.0).unwrap_or(NOMINAL_EFFECT);
        let result = self.attempt(
            "power_analysis",
            json!({ "effect_size": effect.abs(), "n": n, "alpha": POWER_ALPHA }),
        );
        let block = result.valid.then(|| PowerAnalysis {
            statistical_power: result.get_f64("achieved_power"),
            effect_size: effect,
            sample_size: n,
            alpha: POWER_ALPHA,
        });
        self.results.specialized_analyses.insert("power_analysis", result.into());
        block
    }

    // ============ Synthesis ============

    fn synthesize(
        self,
        data: &DimensionalDataset,
        correlation: Option<MethodResult>,
        factor_analysis: Option<FactorAnalysis>,
        reliability_analysis: Option<ReliabilityAnalysis>,
        bootstrap_analysis: Option<BootstrapAnalysis>,
        power_analysis: Option<PowerAnalysis>,
    ) -> ComprehensiveReport {
        let completeness = data.completeness();
        let success_rate = self.tally.success_rate();

        let statistical_tables = match correlation.filter(|r| r.valid) {
            Some(r) => StatisticalTables {
                correlation_matrix: r.get("matrix").cloned().unwrap_or_else(|| json!([])),
                correlation_columns: r.get("columns").cloned().unwrap_or_else(|| json!([])),
            },
            None => StatisticalTables::default(),
        };

        let reliability_finding = match reliability_analysis.as_ref().and_then(|r| r.cronbachs_alpha) {
            Some(alpha) => format!("Cronbach's α = {:.3}", alpha),
            None => "Not computed".to_string(),
        };

        ComprehensiveReport {
            session_id: self.session_id.to_string(),
            engine_version: ENGINE_VERSION,
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            experiments_analyzed: data.n_records(),
            method_results: self.results,
            statistical_tables,
            factor_analysis,
            reliability_analysis,
            bootstrap_analysis,
            power_analysis,
            data_quality: DataQuality::new(completeness, &self.tally),
            execution_summary: ExecutionSummary::from(&self.tally),
            integration_summary: IntegrationSummary {
                key_findings: KeyFindings {
                    reliability: reliability_finding,
                    sample_size: format!("N = {}", data.n_records()),
                },
                academic_credibility: AcademicCredibility {
                    completeness_score: completeness,
                    publication_readiness: Readiness::assess(success_rate, completeness),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{DIMENSIONS, OVERALL_SCORE};
    use maac_plugin::{Capabilities, Capability};
    use serde_json::Map;

    fn record(i: usize, tier: &str) -> JsonValue {
        // Deterministic pseudo-scores in [1, 5] that are not collinear
        let mut fields = Map::new();
        for (j, d) in DIMENSIONS.iter().enumerate() {
            let v = 1.0 + ((i * (j + 3) + j * j) % 17) as f64 / 4.0;
            fields.insert(d.to_string(), json!(v));
        }
        let overall = 1.0 + ((i * 7 + 3) % 13) as f64 / 3.0;
        fields.insert(OVERALL_SCORE.into(), json!(overall));
        fields.insert("tier".into(), json!(tier));
        JsonValue::Object(fields)
    }

    fn run(records: &[JsonValue], ctx: &CallContext) -> ComprehensiveReport {
        let registry = maac_methods::standard_registry();
        Orchestrator::new(&registry, ctx, "test")
            .run(records, &AnalysisOptions::default())
            .unwrap()
    }

    fn seeded() -> CallContext {
        CallContext::new().with_seed(Some(7))
    }

    #[test]
    fn test_empty_input_attempts_nothing() {
        let report = run(&[], &seeded());
        assert_eq!(report.execution_summary.total_methods_attempted, 0);
        assert_eq!(report.execution_summary.success_rate, 0.0);
        assert_eq!(report.data_quality.completeness_rate, 0.0);
        assert!(report.reliability_analysis.is_none());
        assert_eq!(
            report.integration_summary.academic_credibility.publication_readiness,
            Readiness::NeedsImprovement
        );
    }

    #[test]
    fn test_full_run_enters_every_step() {
        let records: Vec<JsonValue> = (0..24)
            .map(|i| record(i, if i % 2 == 0 { "basic" } else { "premium" }))
            .collect();
        let report = run(&records, &seeded());

        let r = &report.method_results;
        assert_eq!(r.descriptive_statistics.len(), 12);
        assert_eq!(r.correlational_analysis.len(), 10);
        assert!(r.testing_procedures.get("shapiro_wilk").is_some());
        for key in ["cohens_d", "hedges_g", "glass_delta", "cronbach_alpha", "pca", "efa", "kmo", "bootstrap_ci", "power_analysis"] {
            assert!(r.specialized_analyses.get(key).is_some(), "{} missing", key);
        }
        // 12 + 9 + 1 + 1 + 3 + 1 + 3 + 1 + 1
        assert_eq!(report.execution_summary.total_methods_attempted, 32);
        assert_eq!(
            report.execution_summary.successful_methods + report.execution_summary.failed_methods,
            32
        );
        assert_eq!(report.statistical_tables.correlation_columns.as_array().unwrap().len(), 9);
        assert!(report.bootstrap_analysis.is_some());
        assert!(report.power_analysis.is_some());
        assert_eq!(report.data_quality.completeness_rate, 1.0);
        assert_eq!(report.engine_version, "4.0.0");
    }

    #[test]
    fn test_bootstrap_interval_brackets_mean() {
        let records: Vec<JsonValue> = (0..15).map(|i| record(i, "a")).collect();
        let report = run(&records, &seeded());
        let b = report.bootstrap_analysis.unwrap();
        let (lo, hi, mean) = (b.confidence_interval[0].unwrap(), b.confidence_interval[1].unwrap(), b.mean.unwrap());
        assert!(lo <= mean && mean <= hi);
        assert_eq!(b.n_iterations, Some(1000));
    }

    #[test]
    fn test_single_group_skips_effect_sizes() {
        let records: Vec<JsonValue> = (0..12).map(|i| record(i, "basic")).collect();
        let report = run(&records, &seeded());
        for key in EFFECT_SIZE_METHODS {
            assert!(report.method_results.specialized_analyses.get(key).is_none());
        }
        // Power falls back to the nominal effect
        assert_eq!(report.power_analysis.unwrap().effect_size, NOMINAL_EFFECT);
    }

    #[test]
    fn test_power_uses_observed_effect() {
        let mut records = Vec::new();
        for i in 0..6 {
            let mut low = record(i, "low");
            low[OVERALL_SCORE] = json!(2.0 + (i % 3) as f64 * 0.1);
            let mut high = record(i + 6, "high");
            high[OVERALL_SCORE] = json!(3.0 + (i % 3) as f64 * 0.1);
            records.push(low);
            records.push(high);
        }
        let report = run(&records, &seeded());
        let d = report.method_results.specialized_analyses.get("cohens_d").unwrap();
        assert!(d.success);
        let observed = d.result.get_f64("cohens_d").unwrap();
        // "low" is seen first, so the first group has the smaller mean
        assert!(observed < 0.0);
        let power = report.power_analysis.unwrap();
        assert_eq!(power.effect_size, observed);
        assert_eq!(power.sample_size, 12);
    }

    #[test]
    fn test_failed_method_is_recorded_not_fatal() {
        // Constant overall score: shapiro_wilk and skew fail, mean still succeeds
        let records: Vec<JsonValue> = (0..5)
            .map(|i| {
                let mut r = record(i, "a");
                r[OVERALL_SCORE] = json!(3.0);
                r
            })
            .collect();
        let report = run(&records, &seeded());
        let sw = report.method_results.testing_procedures.get("shapiro_wilk").unwrap();
        assert!(!sw.success);
        assert!(sw.error.is_some());
        assert!(report.method_results.descriptive_statistics.get("mean").unwrap().success);
        assert!(report.execution_summary.failed_methods >= 1);
    }

    #[test]
    fn test_short_dimensions_are_not_correlated() {
        let mut records: Vec<JsonValue> = (0..5).map(|i| record(i, "a")).collect();
        records[4].as_object_mut().unwrap().remove("maac_cognitive_load");
        let report = run(&records, &seeded());
        let corr = &report.method_results.correlational_analysis;
        assert!(corr.get("pearson_maac_cognitive_load").is_none());
        assert!(corr.get("pearson_maac_tool_execution").is_some());
    }

    #[test]
    fn test_disabled_backend_counts_as_failure() {
        let records: Vec<JsonValue> = (0..12).map(|i| record(i, "a")).collect();
        let ctx = seeded().with_capabilities(Capabilities::all().without(Capability::Power));
        let report = run(&records, &ctx);
        let outcome = report.method_results.specialized_analyses.get("power_analysis").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.result.code.as_deref(), Some(maac_core::codes::UNAVAILABLE));
        assert!(report.power_analysis.is_none());
    }

    #[test]
    fn test_malformed_record_fails_request() {
        let registry = maac_methods::standard_registry();
        let ctx = CallContext::new();
        let err = Orchestrator::new(&registry, &ctx, "bad")
            .run(&[json!("not a record")], &AnalysisOptions::default())
            .unwrap_err();
        assert!(err.is(maac_core::codes::MALFORMED_REQUEST));
    }
}
