//! Position: minimum, maximum, percentile, quantiles, z-scores

use crate::helpers::{self, require_len, XParams};
use maac_core::NumericSeries;
use maac_plugin::prelude::*;
use serde::Deserialize;

static X_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Numeric values")];

// ============ Minimum ============

pub struct Minimum;

static MIN_RELATED: [&str; 2] = ["maximum", "range"];

impl MethodPlugin for Minimum {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "minimum",
            description: "Smallest value",
            usage: "minimum(X)",
            args: &X_ARGS,
            returns: "{minimum, n}",
            family: Family::Descriptive,
            related: &MIN_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("minimum", p.X.len(), 1)?;
        let lo = p.X.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(MethodResult::ok().with("minimum", lo).with("n", p.X.len()))
    }
}

// ============ Maximum ============

pub struct Maximum;

static MAX_RELATED: [&str; 2] = ["minimum", "range"];

impl MethodPlugin for Maximum {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "maximum",
            description: "Largest value",
            usage: "maximum(X)",
            args: &X_ARGS,
            returns: "{maximum, n}",
            family: Family::Descriptive,
            related: &MAX_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("maximum", p.X.len(), 1)?;
        let hi = p.X.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(MethodResult::ok().with("maximum", hi).with("n", p.X.len()))
    }
}

// ============ Percentile ============

pub struct Percentile;

static PERCENTILE_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "Numeric values"),
    ArgMeta::optional("q", "number", "Percentile in [0, 100]", "50"),
];

static PERCENTILE_RELATED: [&str; 2] = ["quantiles", "median"];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct PercentileParams {
    X: NumericSeries,
    #[serde(default = "default_q")]
    q: f64,
}

fn default_q() -> f64 {
    50.0
}

impl MethodPlugin for Percentile {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "percentile",
            description: "q-th percentile with linear interpolation",
            usage: "percentile(X, q=50)",
            args: &PERCENTILE_ARGS,
            returns: "{percentile, q, n}",
            family: Family::Descriptive,
            related: &PERCENTILE_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: PercentileParams = parse(params)?;
        if !(0.0..=100.0).contains(&p.q) {
            return Err(StatError::invalid_params(format!(
                "q must be between 0 and 100, got {}",
                p.q
            )));
        }
        require_len("percentile", p.X.len(), 1)?;
        let s = helpers::sorted(&p.X);
        Ok(MethodResult::ok()
            .with("percentile", helpers::percentile_sorted(&s, p.q))
            .with("q", p.q)
            .with("n", p.X.len()))
    }
}

// ============ Quantiles ============

pub struct Quantiles;

static QUANTILES_RELATED: [&str; 3] = ["iqr", "percentile", "median"];

impl MethodPlugin for Quantiles {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "quantiles",
            description: "Quartiles Q1, Q2, Q3 (linear interpolation)",
            usage: "quantiles(X)",
            args: &X_ARGS,
            returns: "{q1, q2, q3, n}",
            family: Family::Descriptive,
            related: &QUANTILES_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("quantiles", p.X.len(), 1)?;
        let s = helpers::sorted(&p.X);
        Ok(MethodResult::ok()
            .with("q1", helpers::percentile_sorted(&s, 25.0))
            .with("q2", helpers::percentile_sorted(&s, 50.0))
            .with("q3", helpers::percentile_sorted(&s, 75.0))
            .with("n", p.X.len()))
    }
}

// ============ Z-Scores ============

pub struct ZScores;

static ZSCORES_RELATED: [&str; 2] = ["outlier_detection_robust", "std"];

impl MethodPlugin for ZScores {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "z_scores",
            description: "Standard scores using the population standard deviation",
            usage: "z_scores(X)",
            args: &X_ARGS,
            returns: "{z_scores, n}",
            family: Family::Descriptive,
            related: &ZSCORES_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("z_scores", p.X.len(), 2)?;
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("Standard deviation is zero"));
        }
        let m = helpers::mean(&p.X);
        let sd = helpers::std_dev(&p.X, 0.0);
        let z: Vec<f64> = p.X.iter().map(|x| (x - m) / sd).collect();
        Ok(MethodResult::ok().with_floats("z_scores", &z).with("n", p.X.len()))
    }
}
