//! Batch dispatcher
//!
//! Executes an explicit list of method calls with no data-shape gating.
//! Calls are independent: an unknown name or a failing method only marks
//! its own entry.

use maac_core::MethodResult;
use maac_plugin::{CallContext, MethodRegistry, Params};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One requested call
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MethodCall {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

impl MethodCall {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Params) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Outcome of one call, keyed by the caller's id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub id: String,
    pub method: String,
    pub success: bool,
    pub error: Option<String>,
    /// Machine-readable failure code; absent on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub result: Option<MethodResult>,
}

impl CallOutcome {
    fn from_result(call: &MethodCall, result: MethodResult) -> Self {
        if result.valid {
            Self {
                id: call.id.clone(),
                method: call.method.clone(),
                success: true,
                error: None,
                code: None,
                result: Some(result),
            }
        } else {
            Self {
                id: call.id.clone(),
                method: call.method.clone(),
                success: false,
                error: result.error,
                code: result.code,
                result: None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub session_id: String,
    pub total_calls: usize,
    pub successful: usize,
    pub failed: usize,
    /// In input order
    pub results: Vec<CallOutcome>,
}

/// Run every call in order through the registry's failure-isolating wrapper
pub fn dispatch(registry: &MethodRegistry, ctx: &CallContext, calls: &[MethodCall], session_id: &str) -> BatchReport {
    info!(session = session_id, calls = calls.len(), "batch request");

    let results: Vec<CallOutcome> = calls
        .iter()
        .map(|call| {
            let result = registry.call(&call.method, &call.params, ctx);
            if !result.valid {
                warn!(
                    session = session_id,
                    id = call.id.as_str(),
                    method = call.method.as_str(),
                    error = result.error.as_deref().unwrap_or(""),
                    "method failed"
                );
            }
            CallOutcome::from_result(call, result)
        })
        .collect();

    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.len() - successful;
    info!(session = session_id, successful, failed, "batch complete");

    BatchReport {
        session_id: session_id.to_string(),
        total_calls: calls.len(),
        successful,
        failed,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};

    fn call(id: &str, method: &str, params: JsonValue) -> MethodCall {
        MethodCall::new(id, method, params.as_object().cloned().unwrap_or_default())
    }

    fn run(calls: &[MethodCall]) -> BatchReport {
        let registry = maac_methods::standard_registry();
        dispatch(&registry, &CallContext::new().with_seed(Some(1)), calls, "s1")
    }

    #[test]
    fn test_mean_call() {
        let report = run(&[call("a", "mean", json!({"X": [1, 2, 3, 4, 5]}))]);
        assert_eq!(report.total_calls, 1);
        assert_eq!(report.successful, 1);
        let entry = &report.results[0];
        assert!(entry.success);
        let result = entry.result.as_ref().unwrap();
        assert!(result.valid);
        assert_eq!(result.get_f64("mean"), Some(3.0));
        assert_eq!(result.get_f64("n"), Some(5.0));
    }

    #[test]
    fn test_pearson_call() {
        let report = run(&[call("p", "pearson", json!({"X": [1, 2, 3], "Y": [1, 2, 3]}))]);
        let result = report.results[0].result.as_ref().unwrap();
        let r = result.get_f64("r").unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let p = result.get_f64("p").unwrap();
        assert_eq!(result.get_bool("significant"), Some(p < 0.05));
    }

    #[test]
    fn test_unknown_method_isolated() {
        let report = run(&[call("x", "not_a_real_method", json!({}))]);
        assert_eq!(report.successful, 0);
        assert_eq!(report.failed, 1);
        let entry = &report.results[0];
        assert!(!entry.success);
        assert!(entry.result.is_none());
        assert!(entry.error.as_deref().unwrap().to_lowercase().contains("unknown method"));
        assert_eq!(entry.code.as_deref(), Some(maac_core::codes::UNKNOWN_METHOD));
    }

    #[test]
    fn test_order_and_ids_preserved() {
        let report = run(&[
            call("first", "median", json!({"X": [3, 1, 2]})),
            call("second", "cohens_d", json!({"X": [1, 1], "Y": [1, 1]})),
            call("third", "maximum", json!({"X": [3, 1, 2]})),
        ]);
        let ids: Vec<&str> = report.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        assert_eq!((report.successful, report.failed), (2, 1));
        assert_eq!(report.results[1].code.as_deref(), Some(maac_core::codes::DEGENERATE_INPUT));
    }

    #[test]
    fn test_params_default_to_empty() {
        let calls: Vec<MethodCall> = serde_json::from_value(json!([{"id": "a", "method": "mean"}])).unwrap();
        let report = run(&calls);
        assert_eq!(report.results[0].code.as_deref(), Some(maac_core::codes::INVALID_PARAMS));
    }

    #[test]
    fn test_identical_calls_identical_results() {
        let c = call("a", "kendall", json!({"X": [1, 3, 2, 5, 4], "Y": [2, 1, 4, 3, 5]}));
        let report = run(&[c.clone(), c]);
        assert_eq!(report.results[0].result, report.results[1].result);
    }

    #[test]
    fn test_oversized_iterations_fail_only_their_call() {
        let report = run(&[
            call("a", "bootstrap_ci", json!({"X": [1, 2, 3, 4, 5], "n_iterations": 1u64 << 40})),
            call("b", "bootstrap_bca", json!({"X": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10], "n_iterations": 1u64 << 40})),
            call("c", "mean", json!({"X": [1, 2, 3, 4, 5]})),
        ]);
        assert_eq!((report.successful, report.failed), (1, 2));
        assert_eq!(report.results[0].code.as_deref(), Some(maac_core::codes::INVALID_PARAMS));
        assert_eq!(report.results[1].code.as_deref(), Some(maac_core::codes::INVALID_PARAMS));
        let last = report.results[2].result.as_ref().unwrap();
        assert_eq!(last.get_f64("mean"), Some(3.0));
    }
}
