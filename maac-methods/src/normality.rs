//! Normality and assumption tests: Shapiro-Wilk, D'Agostino-Pearson,
//! Jarque-Bera, Levene, Bartlett

use crate::distributions::{chi2_sf, f_sf, norm_ppf, norm_sf};
use crate::helpers::{self, require_groups, require_len, GroupsParams, XParams};
use maac_plugin::prelude::*;
use std::f64::consts::PI;

static X_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "series", "Sample to test")];

static GROUPS_ARGS: [ArgMeta; 1] = [ArgMeta::required(
    "groups",
    "list<series>",
    "Two or more samples, each with at least 2 values",
)];

static NORMALITY_RELATED: [&str; 3] = ["shapiro_wilk", "normaltest", "jarque_bera"];
static VARIANCE_RELATED: [&str; 3] = ["levene", "bartlett", "one_way_anova"];

fn poly(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

// ============ Shapiro-Wilk ============

pub struct ShapiroWilk;

/// Royston's approximation of the Shapiro-Wilk W statistic and its p-value
pub(crate) fn shapiro_wilk(xs: &[f64]) -> (f64, f64) {
    let x = helpers::sorted(xs);
    let n = x.len();
    let nf = n as f64;

    let mut a = vec![0.0; n];
    if n == 3 {
        a[0] = -(0.5f64).sqrt();
        a[2] = (0.5f64).sqrt();
    } else {
        let m: Vec<f64> = (1..=n)
            .map(|i| norm_ppf((i as f64 - 0.375) / (nf + 0.25)))
            .collect();
        let summ2: f64 = m.iter().map(|v| v * v).sum();
        let ssumm2 = summ2.sqrt();
        let u = 1.0 / nf.sqrt();

        const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
        const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];

        let an = m[n - 1] / ssumm2 + poly(&C1, u);
        let (first_mid, phi) = if n > 5 {
            let an1 = m[n - 2] / ssumm2 + poly(&C2, u);
            a[n - 2] = an1;
            a[1] = -an1;
            let phi = (summ2 - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
                / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2));
            (2, phi)
        } else {
            let phi = (summ2 - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2));
            (1, phi)
        };
        a[n - 1] = an;
        a[0] = -an;
        let root = phi.sqrt();
        for i in first_mid..(n - first_mid) {
            a[i] = m[i] / root;
        }
    }

    let mean = helpers::mean(&x);
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let num: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let w = (num * num / ss).min(1.0);

    let p = if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - (0.75f64).sqrt().asin());
        p.clamp(0.0, 1.0)
    } else if n <= 11 {
        let gamma = 0.459 * nf - 2.273;
        let y = (1.0 - w).ln();
        if y >= gamma {
            0.0
        } else {
            let y = -(gamma - y).ln();
            let mu = poly(&[0.5440, -0.39978, 0.025054, -0.0006714], nf);
            let sigma = poly(&[1.3822, -0.77857, 0.062767, -0.0020322], nf).exp();
            norm_sf((y - mu) / sigma)
        }
    } else {
        let v = nf.ln();
        let y = (1.0 - w).ln();
        let mu = poly(&[-1.5861, -0.31082, -0.083751, 0.0038915], v);
        let sigma = poly(&[-0.4803, -0.082676, 0.0030302], v).exp();
        norm_sf((y - mu) / sigma)
    };

    (w, p)
}

impl MethodPlugin for ShapiroWilk {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "shapiro_wilk",
            description: "Shapiro-Wilk normality test (3 <= n <= 5000)",
            usage: "shapiro_wilk(X)",
            args: &X_ARGS,
            returns: "{w, p, normal, n}",
            family: Family::Normality,
            related: &NORMALITY_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        let n = p.X.len();
        if !(3..=5000).contains(&n) {
            return Err(StatError::inapplicable(format!(
                "Sample size must be 3-5000, got {}",
                n
            )));
        }
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("All values are identical"));
        }
        let (w, pv) = shapiro_wilk(&p.X);
        Ok(MethodResult::ok()
            .with("w", w)
            .with("p", pv)
            .with("normal", pv > 0.05)
            .with("n", n))
    }
}

// ============ D'Agostino-Pearson ============

pub struct NormalTest;

fn skew_z(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let b2 = helpers::skewness(xs);
    let y = b2 * ((n + 1.0) * (n + 3.0) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = 3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0)
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

fn kurtosis_z(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let b2 = helpers::excess_kurtosis(xs) + 3.0;
    let e = 3.0 * (n - 1.0) / (n + 1.0);
    let varb2 =
        24.0 * n * (n - 2.0) * (n - 3.0) / ((n + 1.0) * (n + 1.0) * (n + 3.0) * (n + 5.0));
    let x = (b2 - e) / varb2.sqrt();
    let sqrtbeta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * (6.0 * (n + 3.0) * (n + 5.0) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0 + 8.0 / sqrtbeta1 * (2.0 / sqrtbeta1 + (1.0 + 4.0 / (sqrtbeta1 * sqrtbeta1)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).cbrt();
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}

impl MethodPlugin for NormalTest {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "normaltest",
            description: "D'Agostino-Pearson K^2 omnibus normality test (n >= 8)",
            usage: "normaltest(X)",
            args: &X_ARGS,
            returns: "{statistic, p, normal, n}",
            family: Family::Normality,
            related: &NORMALITY_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("normaltest", p.X.len(), 8)?;
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("All values are identical"));
        }
        let k2 = skew_z(&p.X).powi(2) + kurtosis_z(&p.X).powi(2);
        if !k2.is_finite() {
            return Err(StatError::degenerate("Kurtosis transform undefined for this sample"));
        }
        let pv = chi2_sf(k2, 2.0);
        Ok(MethodResult::ok()
            .with("statistic", k2)
            .with("p", pv)
            .with("normal", pv > 0.05)
            .with("n", p.X.len()))
    }
}

// ============ Jarque-Bera ============

pub struct JarqueBera;

impl MethodPlugin for JarqueBera {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "jarque_bera",
            description: "Jarque-Bera normality test from skewness and kurtosis",
            usage: "jarque_bera(X)",
            args: &X_ARGS,
            returns: "{statistic, p, normal, n}",
            family: Family::Normality,
            related: &NORMALITY_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XParams = parse(params)?;
        require_len("jarque_bera", p.X.len(), 3)?;
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("All values are identical"));
        }
        let n = p.X.len() as f64;
        let s = helpers::skewness(&p.X);
        let k = helpers::excess_kurtosis(&p.X);
        let jb = n / 6.0 * (s * s + k * k / 4.0);
        let pv = chi2_sf(jb, 2.0);
        Ok(MethodResult::ok()
            .with("statistic", jb)
            .with("p", pv)
            .with("normal", pv > 0.05)
            .with("n", p.X.len()))
    }
}

// ============ Levene ============

pub struct Levene;

impl MethodPlugin for Levene {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "levene",
            description: "Levene's test for equal variances (median-centred, Brown-Forsythe)",
            usage: "levene(groups)",
            args: &GROUPS_ARGS,
            returns: "{w, p, equal_variances, k}",
            family: Family::Normality,
            related: &VARIANCE_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: GroupsParams = parse(params)?;
        require_groups("levene", &p.groups)?;

        let z: Vec<Vec<f64>> = p
            .groups
            .iter()
            .map(|g| {
                let med = helpers::median(g);
                g.iter().map(|x| (x - med).abs()).collect()
            })
            .collect();
        let k = z.len() as f64;
        let n: f64 = z.iter().map(|g| g.len() as f64).sum();
        let all: Vec<f64> = z.iter().flatten().copied().collect();
        let grand = helpers::mean(&all);

        let between: f64 = z
            .iter()
            .map(|g| g.len() as f64 * (helpers::mean(g) - grand).powi(2))
            .sum();
        let within: f64 = z
            .iter()
            .map(|g| {
                let m = helpers::mean(g);
                g.iter().map(|v| (v - m).powi(2)).sum::<f64>()
            })
            .sum();
        if within == 0.0 {
            return Err(StatError::degenerate("Deviations from group medians have zero variance"));
        }

        let w = (n - k) / (k - 1.0) * between / within;
        let pv = f_sf(w, k - 1.0, n - k);
        Ok(MethodResult::ok()
            .with("w", w)
            .with("p", pv)
            .with("equal_variances", pv > 0.05)
            .with("k", p.groups.len()))
    }
}

// ============ Bartlett ============

pub struct Bartlett;

impl MethodPlugin for Bartlett {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "bartlett",
            description: "Bartlett's test for equal variances",
            usage: "bartlett(groups)",
            args: &GROUPS_ARGS,
            returns: "{chi2, p, equal_variances, k}",
            family: Family::Normality,
            related: &VARIANCE_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: GroupsParams = parse(params)?;
        require_groups("bartlett", &p.groups)?;

        let vars: Vec<f64> = p.groups.iter().map(|g| helpers::variance(g, 1.0)).collect();
        if p.groups.iter().any(|g| helpers::is_constant(g)) {
            return Err(StatError::degenerate("A group has zero variance"));
        }
        let k = p.groups.len() as f64;
        let dfs: Vec<f64> = p.groups.iter().map(|g| g.len() as f64 - 1.0).collect();
        let n_minus_k: f64 = dfs.iter().sum();
        let pooled = dfs.iter().zip(&vars).map(|(d, v)| d * v).sum::<f64>() / n_minus_k;

        let num = n_minus_k * pooled.ln() - dfs.iter().zip(&vars).map(|(d, v)| d * v.ln()).sum::<f64>();
        let c = 1.0 + (dfs.iter().map(|d| 1.0 / d).sum::<f64>() - 1.0 / n_minus_k) / (3.0 * (k - 1.0));
        let t = num / c;
        let pv = chi2_sf(t, k - 1.0);
        Ok(MethodResult::ok()
            .with("chi2", t)
            .with("p", pv)
            .with("equal_variances", pv > 0.05)
            .with("k", p.groups.len()))
    }
}
