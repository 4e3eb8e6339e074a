//! Simple mediation (X -> M -> Y) with Sobel test and bootstrap interval

use crate::distributions::{norm_two_sided_p, t_two_sided_p};
use crate::helpers::{self, ols, significant, OlsFit};
use maac_core::NumericSeries;
use maac_plugin::prelude::*;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};

const DEFAULT_SEED: u64 = 42;
const BOOTSTRAP_RESAMPLES: usize = 500;

static MEDIATION_ARGS: [ArgMeta; 4] = [
    ArgMeta::required("X", "series", "Predictor"),
    ArgMeta::required("M", "series", "Mediator"),
    ArgMeta::required("Y", "series", "Outcome"),
    ArgMeta::optional("seed", "number", "Bootstrap seed", "42"),
];

static MEDIATION_RELATED: [&str; 2] = ["pearson", "bootstrap_ci"];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct MediationParams {
    X: NumericSeries,
    M: NumericSeries,
    Y: NumericSeries,
    #[serde(default)]
    seed: Option<u64>,
}

fn path(coef: f64, se: f64, pval: f64) -> JsonValue {
    json!({
        "coef": maac_core::float_json(coef),
        "se": maac_core::float_json(se),
        "pval": maac_core::float_json(pval),
        "sig": significant(pval),
    })
}

fn fitted_path(fit: &OlsFit, j: usize) -> JsonValue {
    let pval = t_two_sided_p(fit.coef[j] / fit.se[j], fit.df_resid);
    path(fit.coef[j], fit.se[j], pval)
}

/// a (M on X) and b (M in Y on X + M) for one sample
fn indirect_paths(x: &[f64], m: &[f64], y: &[f64]) -> Result<(OlsFit, OlsFit), StatError> {
    Ok((ols(m, &[x])?, ols(y, &[x, m])?))
}

pub struct MediationAnalysis;

impl MethodPlugin for MediationAnalysis {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "mediation_analysis",
            description: "Single-mediator path analysis with Sobel test and bootstrap CI of the indirect effect",
            usage: "mediation_analysis(X, M, Y)",
            args: &MEDIATION_ARGS,
            returns: "{paths, indirect_effect, total_effect, indirect_ci, mediation_detected}",
            family: Family::Mediation,
            related: &MEDIATION_RELATED,
        }
    }

    fn call(&self, params: &Params, ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: MediationParams = parse(params)?;
        let n = p.X.len().min(p.M.len()).min(p.Y.len());
        helpers::require_len("mediation_analysis", n, 10)?;
        let (x, m, y) = (&p.X[..n], &p.M[..n], &p.Y[..n]);

        let (a_fit, full) = indirect_paths(x, m, y)?;
        let y_on_m = ols(y, &[m])?;
        let total = ols(y, &[x])?;

        let (a, se_a) = (a_fit.coef[1], a_fit.se[1]);
        let (b, se_b) = (full.coef[2], full.se[2]);
        let indirect = a * b;
        let sobel_se = (b * b * se_a * se_a + a * a * se_b * se_b).sqrt();
        let indirect_p = if sobel_se > 0.0 {
            norm_two_sided_p(indirect / sobel_se)
        } else {
            1.0
        };

        let mut rng = helpers::rng(Some(ctx.seed_for(p.seed).unwrap_or(DEFAULT_SEED)));
        let mut reps = Vec::with_capacity(BOOTSTRAP_RESAMPLES);
        let (mut bx, mut bm, mut by) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
        for _ in 0..BOOTSTRAP_RESAMPLES {
            for i in 0..n {
                let k = rng.gen_range(0..n);
                bx[i] = x[k];
                bm[i] = m[k];
                by[i] = y[k];
            }
            // Resamples with a singular design are skipped
            if let Ok((ra, rb)) = indirect_paths(&bx, &bm, &by) {
                reps.push(ra.coef[1] * rb.coef[2]);
            }
        }
        reps.sort_by(f64::total_cmp);
        let ci = [
            helpers::percentile_sorted(&reps, 2.5),
            helpers::percentile_sorted(&reps, 97.5),
        ];

        let mut paths = Map::new();
        paths.insert("M ~ X".into(), fitted_path(&a_fit, 1));
        paths.insert("Y ~ M".into(), fitted_path(&y_on_m, 1));
        paths.insert("Total".into(), fitted_path(&total, 1));
        paths.insert("Direct".into(), fitted_path(&full, 1));
        paths.insert("Indirect".into(), path(indirect, sobel_se, indirect_p));

        Ok(MethodResult::ok()
            .with("paths", paths)
            .with("indirect_effect", indirect)
            .with("total_effect", total.coef[1])
            .with_floats("indirect_ci", &ci)
            .with("mediation_detected", indirect != 0.0 && indirect_p < 0.05))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::params;

    fn chain() -> JsonValue {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let m: Vec<f64> = x.iter().enumerate().map(|(i, v)| 2.0 * v + [0.5, -0.5, 0.3, -0.3][i % 4]).collect();
        let y: Vec<f64> = m.iter().enumerate().map(|(i, v)| 1.5 * v + [0.4, 0.4, -0.4, -0.4][i % 4]).collect();
        json!({"X": x, "M": m, "Y": y})
    }

    #[test]
    fn test_mediation_detects_full_chain() {
        let r = MediationAnalysis.call(&params(chain()), &CallContext::new()).unwrap();
        assert_eq!(r.get_bool("mediation_detected"), Some(true));
        let paths = r.get("paths").unwrap().as_object().unwrap();
        assert_eq!(
            paths.keys().collect::<Vec<_>>(),
            vec!["M ~ X", "Y ~ M", "Total", "Direct", "Indirect"]
        );
        let indirect = r.get_f64("indirect_effect").unwrap();
        assert!((indirect - 3.0).abs() < 0.2);
        let ci = r.get("indirect_ci").unwrap().as_array().unwrap();
        assert!(ci[0].as_f64().unwrap() <= indirect && indirect <= ci[1].as_f64().unwrap());
    }

    #[test]
    fn test_mediation_default_seed_is_stable() {
        let a = MediationAnalysis.call(&params(chain()), &CallContext::new()).unwrap();
        let b = MediationAnalysis.call(&params(chain()), &CallContext::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mediation_too_short() {
        let err = MediationAnalysis
            .call(&params(json!({"X": [1, 2, 3], "M": [1, 2, 3], "Y": [1, 2, 3]})), &CallContext::new())
            .unwrap_err();
        assert!(err.is(codes::INAPPLICABLE_INPUT));
    }
}
