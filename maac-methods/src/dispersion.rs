//! Dispersion: std, var, sem, range, iqr, cv

use crate::helpers::{self, require_len, XParams};
use maac_core::NumericSeries;
use maac_plugin::prelude::*;
use serde::Deserialize;

static X_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Numeric values")];

static DDOF_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "Numeric values"),
    ArgMeta::optional("ddof", "integer", "Delta degrees of freedom", "1"),
];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct DdofParams {
    X: NumericSeries,
    #[serde(default = "default_ddof")]
    ddof: u32,
}

fn default_ddof() -> u32 {
    1
}

// ============ Std ============

pub struct Std;

static STD_RELATED: [&str; 3] = ["var", "sem", "robust_std"];

impl MethodPlugin for Std {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "std",
            description: "Standard deviation (sample by default)",
            usage: "std(X, ddof=1)",
            args: &DDOF_ARGS,
            returns: "{std, n}",
            family: Family::Descriptive,
            related: &STD_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: DdofParams = parse(params)?;
        require_len("std", p.X.len(), 2)?;
        Ok(MethodResult::ok()
            .with("std", helpers::std_dev(&p.X, p.ddof as f64))
            .with("n", p.X.len()))
    }
}

// ============ Var ============

pub struct Var;

static VAR_RELATED: [&str; 2] = ["std", "cv"];

impl MethodPlugin for Var {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "var",
            description: "Variance (sample by default)",
            usage: "var(X, ddof=1)",
            args: &DDOF_ARGS,
            returns: "{var, n}",
            family: Family::Descriptive,
            related: &VAR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: DdofParams = parse(params)?;
        require_len("var", p.X.len(), 2)?;
        Ok(MethodResult::ok()
            .with("var", helpers::variance(&p.X, p.ddof as f64))
            .with("n", p.X.len()))
    }
}

// ============ Sem ============

pub struct Sem;

static SEM_RELATED: [&str; 2] = ["std", "bootstrap_ci"];

impl MethodPlugin for Sem {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "sem",
            description: "Standard error of the mean (sample std / sqrt(n))",
            usage: "sem(X)",
            args: &X_ARGS,
            returns: "{sem, n}",
            family: Family::Descriptive,
            related: &SEM_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("sem", p.X.len(), 2)?;
        let n = p.X.len() as f64;
        Ok(MethodResult::ok()
            .with("sem", helpers::std_dev(&p.X, 1.0) / n.sqrt())
            .with("n", p.X.len()))
    }
}

// ============ Range ============

pub struct Range;

static RANGE_RELATED: [&str; 3] = ["minimum", "maximum", "iqr"];

impl MethodPlugin for Range {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "range",
            description: "Difference between maximum and minimum",
            usage: "range(X)",
            args: &X_ARGS,
            returns: "{range, n}",
            family: Family::Descriptive,
            related: &RANGE_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("range", p.X.len(), 1)?;
        let lo = p.X.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = p.X.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(MethodResult::ok().with("range", hi - lo).with("n", p.X.len()))
    }
}

// ============ IQR ============

pub struct Iqr;

static IQR_RELATED: [&str; 2] = ["quantiles", "range"];

impl MethodPlugin for Iqr {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "iqr",
            description: "Interquartile range (Q3 - Q1, linear interpolation)",
            usage: "iqr(X)",
            args: &X_ARGS,
            returns: "{iqr, q1, q3, n}",
            family: Family::Descriptive,
            related: &IQR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("iqr", p.X.len(), 1)?;
        let s = helpers::sorted(&p.X);
        let q1 = helpers::percentile_sorted(&s, 25.0);
        let q3 = helpers::percentile_sorted(&s, 75.0);
        Ok(MethodResult::ok()
            .with("iqr", q3 - q1)
            .with("q1", q1)
            .with("q3", q3)
            .with("n", p.X.len()))
    }
}

// ============ Coefficient of Variation ============

pub struct Cv;

static CV_RELATED: [&str; 2] = ["std", "mean"];

impl MethodPlugin for Cv {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "cv",
            description: "Coefficient of variation in percent (100 * sample std / |mean|)",
            usage: "cv(X)",
            args: &X_ARGS,
            returns: "{cv, mean, n}",
            family: Family::Descriptive,
            related: &CV_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("cv", p.X.len(), 2)?;
        let m = helpers::mean(&p.X);
        if m == 0.0 {
            return Err(StatError::degenerate("Mean is zero"));
        }
        Ok(MethodResult::ok()
            .with("cv", helpers::std_dev(&p.X, 1.0) / m.abs() * 100.0)
            .with("mean", m)
            .with("n", p.X.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::{approx, params};
    use serde_json::json;

    fn ctx() -> CallContext {
        CallContext::new()
    }

    #[test]
    fn test_std_and_var() {
        let x = json!({"X": [2, 4, 4, 4, 5, 5, 7, 9]});
        let v = Var.call(&params(x.clone()), &ctx()).unwrap();
        assert!(approx(v.get_f64("var").unwrap(), 32.0 / 7.0, 1e-12));

        let pop = json!({"X": [2, 4, 4, 4, 5, 5, 7, 9], "ddof": 0});
        let s = Std.call(&params(pop), &ctx()).unwrap();
        assert_eq!(s.get_f64("std"), Some(2.0));
    }

    #[test]
    fn test_std_needs_two() {
        assert!(Std.call(&params(json!({"X": [1]})), &ctx()).is_err());
    }

    #[test]
    fn test_sem() {
        let r = Sem.call(&params(json!({"X": [1, 2, 3, 4]})), &ctx()).unwrap();
        let sd = (5.0f64 / 3.0).sqrt();
        assert!(approx(r.get_f64("sem").unwrap(), sd / 2.0, 1e-12));
    }

    #[test]
    fn test_iqr_and_range() {
        let r = Iqr.call(&params(json!({"X": [1, 2, 3, 4, 5]})), &ctx()).unwrap();
        assert_eq!(r.get_f64("iqr"), Some(2.0));
        let r = Range.call(&params(json!({"X": [3, -1, 7]})), &ctx()).unwrap();
        assert_eq!(r.get_f64("range"), Some(8.0));
    }

    #[test]
    fn test_cv_zero_mean() {
        let err = Cv.call(&params(json!({"X": [-1, 1]})), &ctx()).unwrap_err();
        assert!(err.is(codes::DEGENERATE_INPUT));
    }
}
