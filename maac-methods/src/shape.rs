//! Shape: skewness, kurtosis

use crate::helpers::{self, require_len, XParams};
use maac_plugin::prelude::*;

static X_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Numeric values")];

fn skew_label(s: f64) -> &'static str {
    if s.abs() < 0.5 {
        "symmetric"
    } else if s > 0.0 {
        "right-skewed"
    } else {
        "left-skewed"
    }
}

fn kurtosis_label(k: f64) -> &'static str {
    if k.abs() < 1.0 {
        "mesokurtic"
    } else if k > 0.0 {
        "leptokurtic"
    } else {
        "platykurtic"
    }
}

// ============ Skewness ============

pub struct Skew;

static SKEW_RELATED: [&str; 2] = ["kurtosis", "jarque_bera"];

impl MethodPlugin for Skew {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "skew",
            description: "Population (biased) skewness with a symmetry label",
            usage: "skew(X)",
            args: &X_ARGS,
            returns: "{skewness, interpretation, n}",
            family: Family::Descriptive,
            related: &SKEW_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("skew", p.X.len(), 3)?;
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("Variance is zero"));
        }
        let s = helpers::skewness(&p.X);
        Ok(MethodResult::ok()
            .with("skewness", s)
            .with("interpretation", skew_label(s))
            .with("n", p.X.len()))
    }
}

// ============ Kurtosis ============

pub struct Kurtosis;

static KURTOSIS_RELATED: [&str; 2] = ["skew", "normaltest"];

impl MethodPlugin for Kurtosis {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "kurtosis",
            description: "Fisher excess kurtosis (biased) with a tail label",
            usage: "kurtosis(X)",
            args: &X_ARGS,
            returns: "{kurtosis, interpretation, n}",
            family: Family::Descriptive,
            related: &KURTOSIS_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("kurtosis", p.X.len(), 4)?;
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("Variance is zero"));
        }
        let k = helpers::excess_kurtosis(&p.X);
        Ok(MethodResult::ok()
            .with("kurtosis", k)
            .with("interpretation", kurtosis_label(k))
            .with("n", p.X.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::{approx, params};
    use serde_json::json;

    #[test]
    fn test_skew_symmetric() {
        let r = Skew.call(&params(json!({"X": [1, 2, 3, 4, 5]})), &CallContext::new()).unwrap();
        assert!(approx(r.get_f64("skewness").unwrap(), 0.0, 1e-12));
        assert_eq!(r.get_str("interpretation"), Some("symmetric"));
    }

    #[test]
    fn test_skew_right() {
        let r = Skew.call(&params(json!({"X": [1, 1, 1, 1, 10]})), &CallContext::new()).unwrap();
        assert_eq!(r.get_str("interpretation"), Some("right-skewed"));
    }

    #[test]
    fn test_kurtosis_uniform_is_platykurtic() {
        // Excess kurtosis of 1..5 is -1.3
        let r = Kurtosis.call(&params(json!({"X": [1, 2, 3, 4, 5]})), &CallContext::new()).unwrap();
        assert!(approx(r.get_f64("kurtosis").unwrap(), -1.3, 1e-12));
        assert_eq!(r.get_str("interpretation"), Some("platykurtic"));
    }
}
