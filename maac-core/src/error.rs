//! Structured errors for statistical methods
//!
//! Errors never escape a method call. They are values that end up inside a
//! `MethodResult` and give callers a machine-readable code plus a readable
//! reason.

use crate::NumericError;
use serde::{Deserialize, Serialize};

/// Standard error codes (machine-readable)
pub mod codes {
    /// Data-shape precondition unmet (too few samples, wrong dimensionality)
    pub const INAPPLICABLE_INPUT: &str = "INAPPLICABLE_INPUT";
    /// Finite but degenerate input (zero variance where division occurs)
    pub const DEGENERATE_INPUT: &str = "DEGENERATE_INPUT";
    pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
    pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
    /// Capability switched off at startup
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const KERNEL_FAULT: &str = "KERNEL_FAULT";
    pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
}

/// Structured error carried by failed method results and rejected requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatError {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Suggestion for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// Method that produced the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl StatError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            method: None,
        }
    }

    /// Builder: add suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Builder: attach the method name
    pub fn in_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    // ========== Common Error Constructors ==========

    pub fn inapplicable(details: impl Into<String>) -> Self {
        Self::new(codes::INAPPLICABLE_INPUT, details)
    }

    pub fn too_few(method: &str, min: usize, got: usize) -> Self {
        Self::new(
            codes::INAPPLICABLE_INPUT,
            format!("{}() requires at least {} values, got {}", method, min, got),
        )
    }

    pub fn degenerate(details: impl Into<String>) -> Self {
        Self::new(codes::DEGENERATE_INPUT, details)
    }

    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("Invalid parameters: {}", details.into()))
    }

    pub fn unknown_method(name: &str) -> Self {
        Self::new(codes::UNKNOWN_METHOD, format!("Unknown method: {}", name))
            .with_suggestion("Use list_methods to see available methods")
    }

    pub fn unavailable(backend: &str) -> Self {
        Self::new(codes::UNAVAILABLE, format!("{} backend not available", backend))
            .with_suggestion("Remove it from MAAC_DISABLED_BACKENDS to enable")
    }

    pub fn kernel_fault(details: impl Into<String>) -> Self {
        Self::new(codes::KERNEL_FAULT, format!("Kernel fault: {}", details.into()))
    }

    pub fn malformed(details: impl Into<String>) -> Self {
        Self::new(codes::MALFORMED_REQUEST, format!("Malformed request: {}", details.into()))
    }
}

impl std::fmt::Display for StatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " (suggestion: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for StatError {}

impl From<NumericError> for StatError {
    fn from(err: NumericError) -> Self {
        match err {
            NumericError::Singular(_) | NumericError::ZeroVariance(_) => {
                Self::degenerate(err.to_string())
            }
            NumericError::NonNumeric(_) | NumericError::Ragged { .. } => {
                Self::invalid_params(err.to_string())
            }
        }
    }
}
