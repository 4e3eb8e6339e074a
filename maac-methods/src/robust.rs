//! Robust statistics: trimmed means, MAD scale, modified z-score outliers

use crate::helpers::{self, require_len, XParams};
use maac_core::NumericSeries;
use maac_plugin::prelude::*;
use serde::Deserialize;

/// Normal-consistency constant turning a MAD into a standard deviation estimate
const MAD_SCALE: f64 = 1.4826;
const MODIFIED_Z_CUTOFF: f64 = 3.5;

static X_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Numeric values")];

static ROBUST_RELATED: [&str; 4] = ["robust_mean", "robust_std", "trimmed_mean", "outlier_detection_robust"];

/// Mean after cutting `int(proportion * n)` values from each end
pub(crate) fn trim_mean(xs: &[f64], proportion: f64) -> f64 {
    let s = helpers::sorted(xs);
    let cut = (proportion * s.len() as f64) as usize;
    helpers::mean(&s[cut..s.len() - cut])
}

/// Unscaled median absolute deviation
pub(crate) fn mad(xs: &[f64]) -> f64 {
    let med = helpers::median(xs);
    let dev: Vec<f64> = xs.iter().map(|x| (x - med).abs()).collect();
    helpers::median(&dev)
}

// ============ Robust mean ============

pub struct RobustMean;

impl MethodPlugin for RobustMean {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "robust_mean",
            description: "10% trimmed mean",
            usage: "robust_mean(X)",
            args: &X_ARGS,
            returns: "{robust_mean, n}",
            family: Family::Robust,
            related: &ROBUST_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("robust_mean", p.X.len(), 3)?;
        Ok(MethodResult::ok()
            .with("robust_mean", trim_mean(&p.X, 0.1))
            .with("n", p.X.len()))
    }
}

// ============ Robust std ============

pub struct RobustStd;

impl MethodPlugin for RobustStd {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "robust_std",
            description: "Standard deviation estimated as 1.4826 * MAD",
            usage: "robust_std(X)",
            args: &X_ARGS,
            returns: "{robust_std, mad, n}",
            family: Family::Robust,
            related: &ROBUST_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("robust_std", p.X.len(), 2)?;
        let m = mad(&p.X);
        Ok(MethodResult::ok()
            .with("robust_std", m * MAD_SCALE)
            .with("mad", m)
            .with("n", p.X.len()))
    }
}

// ============ Trimmed mean ============

pub struct TrimmedMean;

static TRIMMED_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "Numeric values"),
    ArgMeta::optional("proportiontocut", "number", "Fraction cut from each end, in [0, 0.5)", "0.1"),
];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct TrimmedParams {
    X: NumericSeries,
    #[serde(default = "default_cut")]
    proportiontocut: f64,
}

fn default_cut() -> f64 {
    0.1
}

impl MethodPlugin for TrimmedMean {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "trimmed_mean",
            description: "Mean after trimming a proportion from both tails",
            usage: "trimmed_mean(X, proportiontocut=0.1)",
            args: &TRIMMED_ARGS,
            returns: "{trimmed_mean, proportion_cut, n}",
            family: Family::Robust,
            related: &ROBUST_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: TrimmedParams = parse(params)?;
        if !(0.0..0.5).contains(&p.proportiontocut) {
            return Err(StatError::invalid_params(format!(
                "proportiontocut must be in [0, 0.5), got {}",
                p.proportiontocut
            )));
        }
        require_len("trimmed_mean", p.X.len(), 3)?;
        Ok(MethodResult::ok()
            .with("trimmed_mean", trim_mean(&p.X, p.proportiontocut))
            .with("proportion_cut", p.proportiontocut)
            .with("n", p.X.len()))
    }
}

// ============ Outlier detection ============

pub struct OutlierDetectionRobust;

static OUTLIER_ARGS: [ArgMeta; 1] = [ArgMeta::required("data", "series", "Values to screen")];

#[derive(Deserialize)]
struct OutlierParams {
    data: NumericSeries,
}

impl MethodPlugin for OutlierDetectionRobust {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "outlier_detection_robust",
            description: "Outliers by modified z-score (|0.6745 (x - median) / MAD| > 3.5)",
            usage: "outlier_detection_robust(data)",
            args: &OUTLIER_ARGS,
            returns: "{outliers, n_outliers, outlier_values}",
            family: Family::Robust,
            related: &ROBUST_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: OutlierParams = parse(params)?;
        require_len("outlier_detection_robust", p.data.len(), 3)?;
        let med = helpers::median(&p.data);
        let m = mad(&p.data);

        let outliers: Vec<usize> = if m == 0.0 {
            Vec::new()
        } else {
            p.data
                .iter()
                .enumerate()
                .filter(|(_, x)| (0.6745 * (*x - med) / m).abs() > MODIFIED_Z_CUTOFF)
                .map(|(i, _)| i)
                .collect()
        };
        let values: Vec<f64> = outliers.iter().map(|&i| p.data[i]).collect();
        Ok(MethodResult::ok()
            .with("n_outliers", outliers.len())
            .with("outliers", outliers)
            .with_floats("outlier_values", &values))
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
    fn test_trim_mean_drops_tails() {
        let xs: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
        assert!(approx(trim_mean(&xs, 0.1), 5.5, 1e-12));
    }

    #[test]
    fn test_robust_std() {
        let r = RobustStd.call(&params(json!({"X": [1, 2, 3, 4, 5]})), &ctx()).unwrap();
        assert_eq!(r.get_f64("mad"), Some(1.0));
        assert!(approx(r.get_f64("robust_std").unwrap(), 1.4826, 1e-12));
    }

    #[test]
    fn test_trimmed_mean_bad_cut() {
        let err = TrimmedMean
            .call(&params(json!({"X": [1, 2, 3], "proportiontocut": 0.5})), &ctx())
            .unwrap_err();
        assert!(err.is(codes::INVALID_PARAMS));
    }

    #[test]
    fn test_outliers_flagged() {
        let r = OutlierDetectionRobust
            .call(&params(json!({"data": [10, 11, 10, 12, 11, 10, 95]})), &ctx())
            .unwrap();
        assert_eq!(r.get("outliers"), Some(&json!([6])));
        assert_eq!(r.get_f64("n_outliers"), Some(1.0));
        assert_eq!(r.get("outlier_values"), Some(&json!([95.0])));
    }

    #[test]
    fn test_outliers_zero_mad() {
        let r = OutlierDetectionRobust
            .call(&params(json!({"data": [5, 5, 5, 5, 40]})), &ctx())
            .unwrap();
        assert_eq!(r.get_f64("n_outliers"), Some(0.0));
    }
}
