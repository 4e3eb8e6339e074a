//! MCP tools
//!
//! - batch: run explicit method calls
//! - comprehensive_analysis: full gated analysis of experiment records
//! - list_methods: method catalogue, optionally by family
//! - describe_method: metadata for one method
//! - health: liveness probe

use crate::protocol::{McpError, INTERNAL_ERROR};
use maac_core::StatError;
use maac_engine::{AnalysisOptions, Engine, MethodCall};
use maac_plugin::Family;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::error;

fn default_batch_session() -> String {
    "batch".to_string()
}

fn default_comprehensive_session() -> String {
    "comprehensive".to_string()
}

#[derive(Deserialize)]
struct BatchArgs {
    calls: Vec<MethodCall>,
    #[serde(default = "default_batch_session")]
    session_id: String,
}

#[derive(Deserialize)]
struct ComprehensiveArgs {
    experiments: Vec<JsonValue>,
    #[serde(default = "default_comprehensive_session")]
    session_id: String,
    #[serde(default)]
    group_field: Option<String>,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    family: Option<String>,
}

#[derive(Deserialize)]
struct DescribeArgs {
    name: String,
}

/// Structurally invalid tool arguments reject the whole request
fn parse_args<T: DeserializeOwned>(args: JsonValue) -> Result<T, McpError> {
    serde_json::from_value(args).map_err(|e| StatError::malformed(e.to_string()).into())
}

fn tool_result<T: Serialize>(text: String, data: &T) -> Result<JsonValue, McpError> {
    let data = serde_json::to_value(data)
        .map_err(|e| McpError::new(INTERNAL_ERROR, format!("Failed to encode result: {}", e)))?;
    Ok(json!({
        "content": [{ "type": "text", "text": text }],
        "data": data,
    }))
}

pub async fn call_tool(engine: &Engine, name: &str, args: JsonValue) -> Result<JsonValue, McpError> {
    match name {
        "batch" => tool_batch(engine, args).await,
        "comprehensive_analysis" => tool_comprehensive(engine, args).await,
        "list_methods" => tool_list_methods(engine, args),
        "describe_method" => tool_describe(engine, args),
        "health" => tool_result("healthy".to_string(), &engine.health()),
        _ => Err(McpError::invalid_params(format!("Unknown tool: {}", name))
            .with_data(json!({ "available": TOOL_NAMES }))),
    }
}

const TOOL_NAMES: [&str; 5] = ["batch", "comprehensive_analysis", "list_methods", "describe_method", "health"];

/// Runs on the blocking pool: a batch may hold many resampling or
/// factor-extraction calls
async fn tool_batch(engine: &Engine, args: JsonValue) -> Result<JsonValue, McpError> {
    let args: BatchArgs = parse_args(args)?;
    let engine = engine.clone();
    let report = tokio::task::spawn_blocking(move || engine.batch(&args.calls, &args.session_id))
        .await
        .map_err(|e| McpError::new(INTERNAL_ERROR, format!("Batch worker failed: {}", e)))?;
    let text = format!(
        "Batch {}: {} calls, {} successful, {} failed",
        report.session_id, report.total_calls, report.successful, report.failed
    );
    tool_result(text, &report)
}

/// Runs on the blocking pool for the same reason as `tool_batch`
async fn tool_comprehensive(engine: &Engine, args: JsonValue) -> Result<JsonValue, McpError> {
    let args: ComprehensiveArgs = parse_args(args)?;
    let mut options = AnalysisOptions::default();
    if let Some(field) = args.group_field {
        options.group_field = field;
    }

    let engine = engine.clone();
    let session_id = args.session_id;
    let experiments = args.experiments;
    let report = tokio::task::spawn_blocking(move || engine.comprehensive(&experiments, &session_id, &options))
        .await
        .map_err(|e| McpError::new(INTERNAL_ERROR, format!("Analysis worker failed: {}", e)))?
        .map_err(|e| {
            error!(error = %e, "comprehensive analysis rejected");
            McpError::from(e)
        })?;

    let summary = &report.execution_summary;
    let text = format!(
        "Analysed {} experiments: {}/{} methods succeeded, publication readiness: {}",
        report.experiments_analyzed,
        summary.successful_methods,
        summary.total_methods_attempted,
        match report.integration_summary.academic_credibility.publication_readiness {
            maac_engine::Readiness::Ready => "ready",
            maac_engine::Readiness::NeedsImprovement => "needs improvement",
        }
    );
    tool_result(text, &report)
}

fn tool_list_methods(engine: &Engine, args: JsonValue) -> Result<JsonValue, McpError> {
    let args: ListArgs = parse_args(args)?;
    let family = match args.family.as_deref() {
        Some(name) => Some(Family::parse(name).ok_or_else(|| {
            let known: Vec<&str> = Family::ALL.iter().map(|f| f.as_str()).collect();
            McpError::invalid_params(format!("Unknown family: {}", name)).with_data(json!({ "families": known }))
        })?),
        None => None,
    };
    let methods = engine.list_methods(family);
    let count = methods.as_array().map_or(0, Vec::len);
    tool_result(format!("{} methods", count), &methods)
}

fn tool_describe(engine: &Engine, args: JsonValue) -> Result<JsonValue, McpError> {
    let args: DescribeArgs = parse_args(args)?;
    let help = engine.describe(&args.name)?;
    let text = format!(
        "{}: {}",
        args.name,
        help.get("description").and_then(JsonValue::as_str).unwrap_or("")
    );
    tool_result(text, &help)
}

/// `tools/list` payload
pub fn tool_definitions() -> JsonValue {
    let families: Vec<&str> = Family::ALL.iter().map(|f| f.as_str()).collect();
    json!({
        "tools": [
            {
                "name": "batch",
                "description": "Execute a list of statistical method calls. Each call is isolated: failures are reported per call.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "calls": {
                            "type": "array",
                            "description": "Method calls to execute in order",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "id": { "type": "string" },
                                    "method": { "type": "string" },
                                    "params": { "type": "object" }
                                },
                                "required": ["id", "method"]
                            }
                        },
                        "session_id": { "type": "string", "default": "batch" }
                    },
                    "required": ["calls"]
                }
            },
            {
                "name": "comprehensive_analysis",
                "description": "Run every applicable analysis over MAAC experiment records and synthesize a report.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "experiments": {
                            "type": "array",
                            "items": { "type": "object" },
                            "description": "Experiment records with maac_* score fields and a group label"
                        },
                        "session_id": { "type": "string", "default": "comprehensive" },
                        "group_field": {
                            "type": "string",
                            "description": "Record field used to form comparison groups",
                            "default": "tier"
                        }
                    },
                    "required": ["experiments"]
                }
            },
            {
                "name": "list_methods",
                "description": "List registered statistical methods.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "family": {
                            "type": "string",
                            "enum": families
                        }
                    }
                }
            },
            {
                "name": "describe_method",
                "description": "Get parameters, return fields and related methods for one method.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" }
                    },
                    "required": ["name"]
                }
            },
            {
                "name": "health",
                "description": "Engine status, version and number of registered methods.",
                "inputSchema": { "type": "object", "properties": {} }
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::INVALID_PARAMS;
    use maac_plugin::CallContext;

    fn engine() -> Engine {
        Engine::with_standard_methods().with_context(CallContext::new().with_seed(Some(3)))
    }

    #[tokio::test]
    async fn test_batch_tool() {
        let out = call_tool(
            &engine(),
            "batch",
            json!({"calls": [{"id": "a", "method": "median", "params": {"X": [5, 1, 3]}}]}),
        )
        .await
        .unwrap();
        assert_eq!(out["data"]["session_id"], json!("batch"));
        assert_eq!(out["data"]["results"][0]["result"]["median"], json!(3.0));
    }

    #[tokio::test]
    async fn test_batch_tool_isolates_oversized_bootstrap() {
        let out = call_tool(
            &engine(),
            "batch",
            json!({"session_id": "s", "calls": [
                {"id": "a", "method": "bootstrap_ci", "params": {"X": [1, 2, 3, 4, 5], "n_iterations": 1u64 << 40}},
                {"id": "b", "method": "mean", "params": {"X": [1, 2, 3]}}
            ]}),
        )
        .await
        .unwrap();
        assert_eq!(out["data"]["failed"], json!(1));
        assert_eq!(out["data"]["results"][0]["code"], json!("INVALID_PARAMS"));
        assert_eq!(out["data"]["results"][1]["result"]["mean"], json!(2.0));
    }

    #[tokio::test]
    async fn test_batch_without_calls_is_rejected() {
        let err = call_tool(&engine(), "batch", json!({})).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_comprehensive_tool() {
        let experiments: Vec<JsonValue> = (0..6)
            .map(|i| json!({"maac_overall_score": 2 + i % 3, "maac_cognitive_load": i, "tier": "a"}))
            .collect();
        let out = call_tool(&engine(), "comprehensive_analysis", json!({"experiments": experiments}))
            .await
            .unwrap();
        assert_eq!(out["data"]["session_id"], json!("comprehensive"));
        assert_eq!(out["data"]["experiments_analyzed"], json!(6));
    }

    #[tokio::test]
    async fn test_comprehensive_malformed_record() {
        let err = call_tool(&engine(), "comprehensive_analysis", json!({"experiments": [1, 2]}))
            .await
            .unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(err.data.unwrap()["code"], json!("MALFORMED_REQUEST"));
    }

    #[tokio::test]
    async fn test_list_methods_by_family() {
        let out = call_tool(&engine(), "list_methods", json!({"family": "bootstrap"})).await.unwrap();
        let names: Vec<&str> = out["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["bootstrap_ci", "bootstrap_bca"]);
        assert!(call_tool(&engine(), "list_methods", json!({"family": "astrology"})).await.is_err());
    }

    #[tokio::test]
    async fn test_describe_unknown_method() {
        let err = call_tool(&engine(), "describe_method", json!({"name": "meen"})).await.unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(err.data.unwrap()["code"], json!("UNKNOWN_METHOD"));
    }

    #[tokio::test]
    async fn test_health_tool() {
        let out = call_tool(&engine(), "health", json!({})).await.unwrap();
        assert_eq!(out["data"]["status"], json!("healthy"));
        assert_eq!(out["data"]["methods_available"], json!(62));
    }
}
