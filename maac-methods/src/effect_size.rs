//! Effect sizes: Cohen's d, Hedges' g, Glass's delta, eta², omega²

use crate::helpers::{self, require_len, XYParams};
use maac_plugin::prelude::*;
use serde::Deserialize;

static XY_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "Treatment (or first) group"),
    ArgMeta::required("Y", "series", "Control (or second) group"),
];

static EFFECT_RELATED: [&str; 4] = ["cohens_d", "hedges_g", "glass_delta", "independent_ttest"];
static VARIANCE_EXPLAINED_RELATED: [&str; 3] = ["eta_squared", "omega_squared", "one_way_anova"];

fn d_label(d: f64) -> &'static str {
    let a = d.abs();
    if a < 0.2 {
        "negligible"
    } else if a < 0.5 {
        "small"
    } else if a < 0.8 {
        "medium"
    } else {
        "large"
    }
}

fn pair_lengths(method: &str, p: &XYParams) -> Result<(), StatError> {
    require_len(method, p.X.len(), 2)?;
    require_len(method, p.Y.len(), 2)
}

/// Standardised mean difference using the pooled sample standard deviation
pub(crate) fn cohens_d(x: &[f64], y: &[f64]) -> Result<f64, StatError> {
    let (nx, ny) = (x.len() as f64, y.len() as f64);
    let pooled = (((nx - 1.0) * helpers::variance(x, 1.0) + (ny - 1.0) * helpers::variance(y, 1.0))
        / (nx + ny - 2.0))
        .sqrt();
    if pooled == 0.0 || !pooled.is_finite() {
        return Err(StatError::degenerate("Pooled std is zero"));
    }
    Ok((helpers::mean(x) - helpers::mean(y)) / pooled)
}

// ============ Cohen's d ============

pub struct CohensD;

impl MethodPlugin for CohensD {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "cohens_d",
            description: "Cohen's d with pooled standard deviation",
            usage: "cohens_d(X, Y)",
            args: &XY_ARGS,
            returns: "{cohens_d, interpretation}",
            family: Family::EffectSize,
            related: &EFFECT_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        pair_lengths("cohens_d", &p)?;
        let d = cohens_d(&p.X, &p.Y)?;
        Ok(MethodResult::ok()
            .with("cohens_d", d)
            .with("interpretation", d_label(d)))
    }
}

// ============ Hedges' g ============

pub struct HedgesG;

impl MethodPlugin for HedgesG {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "hedges_g",
            description: "Hedges' g, the small-sample corrected Cohen's d",
            usage: "hedges_g(X, Y)",
            args: &XY_ARGS,
            returns: "{hedges_g, interpretation}",
            family: Family::EffectSize,
            related: &EFFECT_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        pair_lengths("hedges_g", &p)?;
        let d = cohens_d(&p.X, &p.Y)?;
        let n = (p.X.len() + p.Y.len()) as f64;
        let g = d * (1.0 - 3.0 / (4.0 * (n - 2.0) - 1.0));
        Ok(MethodResult::ok()
            .with("hedges_g", g)
            .with("interpretation", d_label(g)))
    }
}

// ============ Glass's delta ============

pub struct GlassDelta;

impl MethodPlugin for GlassDelta {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "glass_delta",
            description: "Glass's delta, scaled by the control group (Y) standard deviation",
            usage: "glass_delta(X, Y)",
            args: &XY_ARGS,
            returns: "{glass_delta}",
            family: Family::EffectSize,
            related: &EFFECT_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        pair_lengths("glass_delta", &p)?;
        if helpers::is_constant(&p.Y) {
            return Err(StatError::degenerate("Control std is zero"));
        }
        let delta = (helpers::mean(&p.X) - helpers::mean(&p.Y)) / helpers::std_dev(&p.Y, 1.0);
        Ok(MethodResult::ok().with("glass_delta", delta))
    }
}

// ============ Eta squared ============

pub struct EtaSquared;

static ETA_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("ss_effect", "number", "Effect sum of squares"),
    ArgMeta::required("ss_total", "number", "Total sum of squares"),
];

#[derive(Deserialize)]
struct EtaParams {
    ss_effect: f64,
    ss_total: f64,
}

impl MethodPlugin for EtaSquared {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "eta_squared",
            description: "Proportion of variance explained from sums of squares",
            usage: "eta_squared(ss_effect, ss_total)",
            args: &ETA_ARGS,
            returns: "{eta_squared, interpretation}",
            family: Family::EffectSize,
            related: &VARIANCE_EXPLAINED_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: EtaParams = parse(params)?;
        if p.ss_total == 0.0 {
            return Err(StatError::degenerate("Total sum of squares is zero"));
        }
        let eta2 = p.ss_effect / p.ss_total;
        let label = if eta2 < 0.06 {
            "small"
        } else if eta2 < 0.14 {
            "medium"
        } else {
            "large"
        };
        Ok(MethodResult::ok()
            .with("eta_squared", eta2)
            .with("interpretation", label))
    }
}

// ============ Omega squared ============

pub struct OmegaSquared;

static OMEGA_ARGS: [ArgMeta; 5] = [
    ArgMeta::required("ss_effect", "number", "Effect sum of squares"),
    ArgMeta::required("ss_error", "number", "Error sum of squares"),
    ArgMeta::required("ms_error", "number", "Error mean square"),
    ArgMeta::required("df_effect", "number", "Effect degrees of freedom"),
    ArgMeta::required("n_total", "number", "Total observations"),
];

#[derive(Deserialize)]
#[allow(dead_code)]
struct OmegaParams {
    ss_effect: f64,
    ss_error: f64,
    ms_error: f64,
    df_effect: f64,
    n_total: f64,
}

impl MethodPlugin for OmegaSquared {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "omega_squared",
            description: "Omega squared, the less biased variance-explained estimate (floored at 0)",
            usage: "omega_squared(ss_effect, ss_error, ms_error, df_effect, n_total)",
            args: &OMEGA_ARGS,
            returns: "{omega_squared, interpretation}",
            family: Family::EffectSize,
            related: &VARIANCE_EXPLAINED_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: OmegaParams = parse(params)?;
        let ss_total = p.ss_effect + p.ss_error;
        let denom = ss_total + p.ms_error;
        if denom == 0.0 {
            return Err(StatError::degenerate("Total sum of squares is zero"));
        }
        let omega2 = ((p.ss_effect - p.df_effect * p.ms_error) / denom).max(0.0);
        let label = if omega2 < 0.01 {
            "small"
        } else if omega2 < 0.06 {
            "medium"
        } else {
            "large"
        };
        Ok(MethodResult::ok()
            .with("omega_squared", omega2)
            .with("interpretation", label))
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
    fn test_cohens_d_large() {
        let r = CohensD
            .call(&params(json!({"X": [4, 5, 6], "Y": [1, 2, 3]})), &ctx())
            .unwrap();
        assert!(approx(r.get_f64("cohens_d").unwrap(), 3.0, 1e-12));
        assert_eq!(r.get_str("interpretation"), Some("large"));
    }

    #[test]
    fn test_cohens_d_antisymmetric() {
        let (x, y) = (json!([4, 5, 6, 8]), json!([1, 2, 3, 3]));
        let forward = CohensD.call(&params(json!({"X": x, "Y": y})), &ctx()).unwrap();
        let backward = CohensD.call(&params(json!({"X": y, "Y": x})), &ctx()).unwrap();
        let (d_xy, d_yx) = (forward.get_f64("cohens_d").unwrap(), backward.get_f64("cohens_d").unwrap());
        assert!(d_xy > 0.0);
        assert!(approx(d_xy, -d_yx, 1e-12));
        assert_eq!(forward.get_str("interpretation"), backward.get_str("interpretation"));
    }

    #[test]
    fn test_hedges_smaller_than_d() {
        let p = params(json!({"X": [4, 5, 6, 7], "Y": [1, 2, 3, 5]}));
        let d = CohensD.call(&p, &ctx()).unwrap().get_f64("cohens_d").unwrap();
        let g = HedgesG.call(&p, &ctx()).unwrap().get_f64("hedges_g").unwrap();
        assert!(g.abs() < d.abs());
    }

    #[test]
    fn test_cohens_d_zero_pooled() {
        let err = CohensD
            .call(&params(json!({"X": [2, 2], "Y": [5, 5]})), &ctx())
            .unwrap_err();
        assert!(err.is(codes::DEGENERATE_INPUT));
    }

    #[test]
    fn test_glass_delta() {
        let r = GlassDelta
            .call(&params(json!({"X": [5, 6, 7], "Y": [1, 2, 3]})), &ctx())
            .unwrap();
        assert!(approx(r.get_f64("glass_delta").unwrap(), 4.0, 1e-12));
        let err = GlassDelta
            .call(&params(json!({"X": [5, 6, 7], "Y": [1, 1, 1]})), &ctx())
            .unwrap_err();
        assert!(err.is(codes::DEGENERATE_INPUT));
    }

    #[test]
    fn test_variance_explained() {
        let eta = EtaSquared
            .call(&params(json!({"ss_effect": 10, "ss_total": 50})), &ctx())
            .unwrap();
        assert!(approx(eta.get_f64("eta_squared").unwrap(), 0.2, 1e-12));
        assert_eq!(eta.get_str("interpretation"), Some("large"));

        let omega = OmegaSquared
            .call(
                &params(json!({"ss_effect": 1, "ss_error": 100, "ms_error": 5, "df_effect": 2, "n_total": 30})),
                &ctx(),
            )
            .unwrap();
        assert_eq!(omega.get_f64("omega_squared"), Some(0.0));
    }
}
