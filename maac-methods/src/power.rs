//! Power analysis for the two-sample t-test and one-way ANOVA

use crate::distributions::{f_isf, ncf_sf, nct_cdf, t_ppf};
use maac_plugin::prelude::*;
use serde::Deserialize;

static POWER_RELATED: [&str; 3] = ["power_analysis", "power_ttest", "power_anova"];

fn default_alpha() -> f64 {
    0.05
}

fn check_alpha(alpha: f64) -> Result<(), StatError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(StatError::invalid_params(format!("alpha must be in (0, 1), got {}", alpha)));
    }
    Ok(())
}

/// Power of a two-sided independent t-test with `n` observations per group
pub fn ttest_power(effect_size: f64, n: f64, alpha: f64) -> Result<f64, StatError> {
    let df = 2.0 * n - 2.0;
    let nc = effect_size * (n / 2.0).sqrt();
    let crit = t_ppf(1.0 - alpha / 2.0, df)?;
    Ok((1.0 - nct_cdf(crit, df, nc) + nct_cdf(-crit, df, nc)).clamp(0.0, 1.0))
}

/// Smallest per-group n (continuous) reaching `target` power, by bisection
fn solve_n(effect_size: f64, target: f64, alpha: f64) -> Result<f64, StatError> {
    let mut lo = 2.0;
    if ttest_power(effect_size, lo, alpha)? >= target {
        return Ok(lo);
    }
    let mut hi = 4.0;
    while ttest_power(effect_size, hi, alpha)? < target {
        hi *= 2.0;
        if hi > 1e7 {
            return Err(StatError::inapplicable("Required sample size exceeds 10 million per group"));
        }
    }
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if ttest_power(effect_size, mid, alpha)? < target {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-6 {
            break;
        }
    }
    Ok(hi)
}

/// Power of a one-way ANOVA with `nobs` total observations over `k` groups
pub fn anova_power(effect_size: f64, nobs: f64, k: f64, alpha: f64) -> Result<f64, StatError> {
    let (d1, d2) = (k - 1.0, nobs - k);
    let crit = f_isf(alpha, d1, d2)?;
    Ok(ncf_sf(crit, d1, d2, effect_size * effect_size * nobs).clamp(0.0, 1.0))
}

// ============ Power analysis (t-test) ============

pub struct PowerAnalysis;

static ANALYSIS_ARGS: [ArgMeta; 4] = [
    ArgMeta::required("effect_size", "number", "Cohen's d"),
    ArgMeta::optional("n", "number", "Per-group sample size (gives achieved power)", "null"),
    ArgMeta::optional("power", "number", "Target power (gives required n)", "null"),
    ArgMeta::optional("alpha", "number", "Significance level", "0.05"),
];

#[derive(Deserialize)]
struct AnalysisParams {
    effect_size: f64,
    #[serde(default)]
    n: Option<u64>,
    #[serde(default)]
    power: Option<f64>,
    #[serde(default = "default_alpha")]
    alpha: f64,
}

fn achieved(effect_size: f64, n: u64, alpha: f64) -> Result<MethodResult, StatError> {
    if n < 2 {
        return Err(StatError::invalid_params(format!("n must be at least 2, got {}", n)));
    }
    let power = ttest_power(effect_size, n as f64, alpha)?;
    Ok(MethodResult::ok()
        .with("achieved_power", power)
        .with("effect_size", effect_size)
        .with("n", n)
        .with("alpha", alpha))
}

impl MethodPlugin for PowerAnalysis {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "power_analysis",
            description: "Two-sample t-test power: achieved power from n, or required n from power",
            usage: "power_analysis(effect_size, n=None, power=None, alpha=0.05)",
            args: &ANALYSIS_ARGS,
            returns: "{n_required, effect_size, power, alpha} or {achieved_power, effect_size, n, alpha}",
            family: Family::Power,
            related: &POWER_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: AnalysisParams = parse(params)?;
        check_alpha(p.alpha)?;
        match (p.n, p.power) {
            (Some(n), None) => achieved(p.effect_size, n, p.alpha),
            (None, Some(target)) => {
                if !(target > p.alpha && target < 1.0) {
                    return Err(StatError::invalid_params(format!(
                        "power must be in (alpha, 1), got {}",
                        target
                    )));
                }
                if p.effect_size == 0.0 {
                    return Err(StatError::inapplicable("Effect size of zero cannot reach the target power"));
                }
                let n = solve_n(p.effect_size.abs(), target, p.alpha)?;
                Ok(MethodResult::ok()
                    .with("n_required", n.ceil() as u64)
                    .with("effect_size", p.effect_size)
                    .with("power", target)
                    .with("alpha", p.alpha))
            }
            _ => Err(StatError::invalid_params("Provide either n or power, not both")),
        }
    }
}

// ============ Power (t-test, fixed n) ============

pub struct PowerTTest;

static TTEST_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("effect_size", "number", "Cohen's d"),
    ArgMeta::required("nobs", "number", "Per-group sample size"),
    ArgMeta::optional("alpha", "number", "Significance level", "0.05"),
];

#[derive(Deserialize)]
struct TTestParams {
    effect_size: f64,
    nobs: u64,
    #[serde(default = "default_alpha")]
    alpha: f64,
}

impl MethodPlugin for PowerTTest {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "power_ttest",
            description: "Achieved power of a two-sample t-test",
            usage: "power_ttest(effect_size, nobs, alpha=0.05)",
            args: &TTEST_ARGS,
            returns: "{achieved_power, effect_size, n, alpha}",
            family: Family::Power,
            related: &POWER_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: TTestParams = parse(params)?;
        check_alpha(p.alpha)?;
        achieved(p.effect_size, p.nobs, p.alpha)
    }
}

// ============ Power (ANOVA) ============

pub struct PowerAnova;

static ANOVA_ARGS: [ArgMeta; 4] = [
    ArgMeta::required("k_groups", "number", "Number of groups"),
    ArgMeta::required("effect_size", "number", "Cohen's f"),
    ArgMeta::required("nobs", "number", "Total observations"),
    ArgMeta::optional("alpha", "number", "Significance level", "0.05"),
];

#[derive(Deserialize)]
struct AnovaParams {
    k_groups: u64,
    effect_size: f64,
    nobs: u64,
    #[serde(default = "default_alpha")]
    alpha: f64,
}

impl MethodPlugin for PowerAnova {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "power_anova",
            description: "Achieved power of a one-way ANOVA (noncentral F)",
            usage: "power_anova(k_groups, effect_size, nobs, alpha=0.05)",
            args: &ANOVA_ARGS,
            returns: "{achieved_power, effect_size, n, k_groups, alpha}",
            family: Family::Power,
            related: &POWER_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: AnovaParams = parse(params)?;
        check_alpha(p.alpha)?;
        if p.k_groups < 2 {
            return Err(StatError::invalid_params("k_groups must be at least 2"));
        }
        if p.nobs <= p.k_groups {
            return Err(StatError::invalid_params("nobs must exceed k_groups"));
        }
        let power = anova_power(p.effect_size, p.nobs as f64, p.k_groups as f64, p.alpha)?;
        Ok(MethodResult::ok()
            .with("achieved_power", power)
            .with("effect_size", p.effect_size)
            .with("n", p.nobs)
            .with("k_groups", p.k_groups)
            .with("alpha", p.alpha))
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
    fn test_required_n_medium_effect() {
        // d = 0.5, power 0.8, alpha 0.05 needs 64 per group
        let r = PowerAnalysis
            .call(&params(json!({"effect_size": 0.5, "power": 0.8})), &ctx())
            .unwrap();
        assert_eq!(r.get_f64("n_required"), Some(64.0));
    }

    #[test]
    fn test_achieved_power() {
        let r = PowerAnalysis
            .call(&params(json!({"effect_size": 0.5, "n": 64})), &ctx())
            .unwrap();
        assert!(approx(r.get_f64("achieved_power").unwrap(), 0.8015, 2e-3));
        let t = PowerTTest
            .call(&params(json!({"effect_size": 0.5, "nobs": 64})), &ctx())
            .unwrap();
        assert_eq!(r.get_f64("achieved_power"), t.get_f64("achieved_power"));
    }

    #[test]
    fn test_both_or_neither() {
        let both = PowerAnalysis
            .call(&params(json!({"effect_size": 0.5, "n": 20, "power": 0.8})), &ctx())
            .unwrap_err();
        assert!(both.is(codes::INVALID_PARAMS));
        let neither = PowerAnalysis
            .call(&params(json!({"effect_size": 0.5})), &ctx())
            .unwrap_err();
        assert!(neither.is(codes::INVALID_PARAMS));
    }

    #[test]
    fn test_anova_power_monotone_in_n() {
        let small = PowerAnova
            .call(&params(json!({"k_groups": 3, "effect_size": 0.25, "nobs": 60})), &ctx())
            .unwrap()
            .get_f64("achieved_power")
            .unwrap();
        let large = PowerAnova
            .call(&params(json!({"k_groups": 3, "effect_size": 0.25, "nobs": 240})), &ctx())
            .unwrap()
            .get_f64("achieved_power")
            .unwrap();
        assert!(small > 0.05 && small < large && large <= 1.0);
    }
}
