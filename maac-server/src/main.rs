//! MAAC Statistical Engine MCP Server
//!
//! Newline-delimited JSON-RPC 2.0 over stdio. Stdout carries protocol
//! messages only; logs go to stderr.
//!
//! Tools:
//! - batch: Execute a list of method calls
//! - comprehensive_analysis: Analyse experiment records end to end
//! - list_methods: List available methods
//! - describe_method: Documentation for one method
//! - health: Liveness probe

mod config;
mod protocol;
mod tools;

use config::{ServerConfig, DEFAULT_LOG_FILTER};
use maac_engine::Engine;
use protocol::{McpError, McpRequest, McpResponse, METHOD_NOT_FOUND, PARSE_ERROR};
use serde_json::{json, Value as JsonValue};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const PROTOCOL_VERSION: &str = "2025-11-25";
const SERVER_NAME: &str = "maac-stat-engine";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = ServerConfig::from_env();
    init_logging(config.as_ref().map_or(DEFAULT_LOG_FILTER, |c| c.log_filter.as_str()));

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(maac_methods::standard_registry());
    let engine = Engine::new(registry, config.call_context());

    let disabled: Vec<&str> = config.capabilities.disabled().iter().map(|c| c.name()).collect();
    info!(
        version = SERVER_VERSION,
        protocol = PROTOCOL_VERSION,
        methods = engine.registry().len(),
        seed = ?config.bootstrap_seed,
        disabled = ?disabled,
        "MAAC statistical engine started"
    );

    match serve(engine).await {
        Ok(()) => {
            info!("server shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "stdio transport failed");
            ExitCode::FAILURE
        }
    }
}

/// Read requests until EOF. Each request is handled on its own task so a
/// long analysis never blocks the reader; a single writer task owns stdout.
async fn serve(engine: Engine) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<McpResponse>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_string(&response)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<(), io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(bytes = line.len(), "request received");

        let request: McpRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unparseable request");
                let error = McpError::new(PARSE_ERROR, format!("Parse error: {}", e));
                let _ = tx.send(McpResponse::reply(None, Err(error)));
                continue;
            }
        };

        let engine = engine.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = handle_request(&engine, &request).await;
            // Notifications (no id) get no response
            match request.id {
                Some(id) => {
                    let _ = tx.send(McpResponse::reply(Some(id), outcome));
                }
                None => debug!(method = request.method.as_str(), "notification processed"),
            }
        });
    }

    info!("client disconnected (EOF)");
    drop(tx);
    writer
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

async fn handle_request(engine: &Engine, request: &McpRequest) -> Result<JsonValue, McpError> {
    debug!(method = request.method.as_str(), "processing");
    match request.method.as_str() {
        // Lifecycle
        "initialize" => Ok(handle_initialize(&request.params)),
        "initialized" | "notifications/initialized" => Ok(json!({})),
        "ping" => Ok(json!({})),

        // Tools
        "tools/list" => Ok(tools::tool_definitions()),
        "tools/call" => handle_tool_call(engine, &request.params).await,

        _ => Err(McpError::new(METHOD_NOT_FOUND, format!("Method not found: {}", request.method))),
    }
}

fn handle_initialize(params: &Option<JsonValue>) -> JsonValue {
    let client_info = params
        .as_ref()
        .and_then(|p| p.get("clientInfo"))
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("unknown");

    // Echo the client's protocol version for compatibility
    let client_protocol = params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(|v| v.as_str())
        .unwrap_or(PROTOCOL_VERSION);

    info!(client = client_info, protocol = client_protocol, "client connected");

    json!({
        "protocolVersion": client_protocol,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "description": "Statistical analysis engine for the MAAC research platform"
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "instructions": "Use 'batch' to run named statistical methods with explicit parameters and 'comprehensive_analysis' to analyse MAAC experiment records end to end. 'list_methods' and 'describe_method' document the catalogue."
    })
}

async fn handle_tool_call(engine: &Engine, params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
    let params = params
        .as_ref()
        .ok_or_else(|| McpError::invalid_params("Missing params"))?;

    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| McpError::invalid_params("Missing tool name"))?;

    let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    info!(tool = name, "tool call");
    tools::call_tool(engine, name, args).await
}
