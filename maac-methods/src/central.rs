//! Central tendency: mean, median

use crate::helpers::{self, require_len, XParams};
use maac_plugin::prelude::*;

static X_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Numeric values")];

// ============ Mean ============

pub struct Mean;

static MEAN_RELATED: [&str; 3] = ["median", "robust_mean", "trimmed_mean"];

impl MethodPlugin for Mean {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "mean",
            description: "Arithmetic mean",
            usage: "mean(X)",
            args: &X_ARGS,
            returns: "{mean, n}",
            family: Family::Descriptive,
            related: &MEAN_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("mean", p.X.len(), 1)?;
        Ok(MethodResult::ok()
            .with("mean", helpers::mean(&p.X))
            .with("n", p.X.len()))
    }
}

// ============ Median ============

pub struct Median;

static MEDIAN_RELATED: [&str; 3] = ["mean", "percentile", "quantiles"];

impl MethodPlugin for Median {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "median",
            description: "Middle value (average of the two middle values for even n)",
            usage: "median(X)",
            args: &X_ARGS,
            returns: "{median, n}",
            family: Family::Descriptive,
            related: &MEDIAN_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("median", p.X.len(), 1)?;
        Ok(MethodResult::ok()
            .with("median", helpers::median(&p.X))
            .with("n", p.X.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::params;
    use serde_json::json;

    fn ctx() -> CallContext {
        CallContext::new()
    }

    #[test]
    fn test_mean() {
        let r = Mean.call(&params(json!({"X": [1, 2, 3, 4, 5]})), &ctx()).unwrap();
        assert_eq!(r.get_f64("mean"), Some(3.0));
        assert_eq!(r.get_f64("n"), Some(5.0));
    }

    #[test]
    fn test_mean_drops_nulls() {
        let r = Mean.call(&params(json!({"X": [2, null, 4]})), &ctx()).unwrap();
        assert_eq!(r.get_f64("mean"), Some(3.0));
        assert_eq!(r.get_f64("n"), Some(2.0));
    }

    #[test]
    fn test_mean_empty() {
        let err = Mean.call(&params(json!({"X": []})), &ctx()).unwrap_err();
        assert!(err.is(codes::INAPPLICABLE_INPUT));
    }

    #[test]
    fn test_median_even() {
        let r = Median.call(&params(json!({"X": [4, 1, 3, 2]})), &ctx()).unwrap();
        assert_eq!(r.get_f64("median"), Some(2.5));
    }
}
