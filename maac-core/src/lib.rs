//! MAAC Core - Fundamental types
//!
//! This crate provides the core types used throughout the engine:
//! - `NumericSeries` / `DataTable`: validated numeric inputs
//! - `MethodResult`: uniform outcome of a method call
//! - `StatError`: structured errors with machine-readable codes

mod error;
mod number;
mod result;
mod series;

pub use error::{codes, StatError};
pub use number::{coerce_f64, parse_element, safe_float, NumericError};
pub use result::{float_json, MethodResult};
pub use series::{DataTable, NumericSeries};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::codes;
    pub use crate::{DataTable, MethodResult, NumericSeries, StatError};
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_error_construction() {
            let err = StatError::unknown_method("foo");
            assert_eq!(err.code, codes::UNKNOWN_METHOD);
            assert_eq!(err.message, "Unknown method: foo");
        }

        #[test]
        fn test_error_display() {
            let err = StatError::degenerate("zero variance").with_suggestion("check inputs");
            let display = format!("{}", err);
            assert!(display.contains("DEGENERATE_INPUT"));
            assert!(display.contains("check inputs"));
        }

        #[test]
        fn test_numeric_error_mapping() {
            let err: StatError = NumericError::Singular("R".into()).into();
            assert!(err.is(codes::DEGENERATE_INPUT));
            let err: StatError = NumericError::NonNumeric("x".into()).into();
            assert!(err.is(codes::INVALID_PARAMS));
        }
    }
}
