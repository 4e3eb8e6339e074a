//! Correlational analysis: pearson, spearman, kendall, correlation_matrix

use crate::distributions::{norm_two_sided_p, t_two_sided_p};
use crate::helpers::{self, common_pair, require_len, significant, TableParams, XYParams};
use maac_plugin::prelude::*;

static XY_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "First variable"),
    ArgMeta::required("Y", "series", "Second variable (truncated to the common length)"),
];

fn strength_label(r: f64) -> &'static str {
    let a = r.abs();
    if a < 0.1 {
        "negligible"
    } else if a < 0.3 {
        "weak"
    } else if a < 0.5 {
        "moderate"
    } else if a < 0.7 {
        "strong"
    } else {
        "very strong"
    }
}

/// p-value of a correlation coefficient via the t distribution with n-2 df
fn correlation_p(r: f64, n: usize) -> f64 {
    let df = n as f64 - 2.0;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    t_two_sided_p(r * (df / denom).sqrt(), df)
}

// ============ Pearson ============

pub struct Pearson;

static PEARSON_RELATED: [&str; 3] = ["spearman", "kendall", "correlation_matrix"];

impl MethodPlugin for Pearson {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "pearson",
            description: "Pearson product-moment correlation with two-sided p-value",
            usage: "pearson(X, Y)",
            args: &XY_ARGS,
            returns: "{r, p, significant, strength, n}",
            family: Family::Correlational,
            related: &PEARSON_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        let (x, y) = common_pair(&p.X, &p.Y);
        require_len("pearson", x.len(), 3)?;
        let r = helpers::pearson_r(x, y)
            .ok_or_else(|| StatError::degenerate("Correlation undefined: zero variance input"))?;
        let pv = correlation_p(r, x.len());
        Ok(MethodResult::ok()
            .with("r", r)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("strength", strength_label(r))
            .with("n", x.len()))
    }
}

// ============ Spearman ============

pub struct Spearman;

static SPEARMAN_RELATED: [&str; 2] = ["pearson", "kendall"];

impl MethodPlugin for Spearman {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "spearman",
            description: "Spearman rank correlation (average ranks for ties)",
            usage: "spearman(X, Y)",
            args: &XY_ARGS,
            returns: "{rho, p, significant, n}",
            family: Family::Correlational,
            related: &SPEARMAN_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        let (x, y) = common_pair(&p.X, &p.Y);
        require_len("spearman", x.len(), 3)?;
        let rho = helpers::pearson_r(&helpers::ranks(x), &helpers::ranks(y))
            .ok_or_else(|| StatError::degenerate("Correlation undefined: zero variance input"))?;
        let pv = correlation_p(rho, x.len());
        Ok(MethodResult::ok()
            .with("rho", rho)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("n", x.len()))
    }
}

// ============ Kendall ============

pub struct Kendall;

static KENDALL_RELATED: [&str; 2] = ["spearman", "pearson"];

/// Kendall tau-b and its two-sided p-value (normal approximation)
fn kendall_tau(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    let mut s = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx != 0.0 && dy != 0.0 {
                s += (dx * dy).signum();
            }
        }
    }

    let nf = n as f64;
    let n0 = nf * (nf - 1.0) / 2.0;
    let tx = helpers::tie_counts(x);
    let ty = helpers::tie_counts(y);
    let pairs = |ts: &[usize]| ts.iter().map(|&t| (t * (t - 1)) as f64 / 2.0).sum::<f64>();
    let (n1, n2) = (pairs(&tx), pairs(&ty));
    let denom = ((n0 - n1) * (n0 - n2)).sqrt();
    if denom == 0.0 {
        return None;
    }
    let tau = (s / denom).clamp(-1.0, 1.0);

    let v0 = nf * (nf - 1.0) * (2.0 * nf + 5.0);
    let vt = |ts: &[usize]| {
        ts.iter()
            .map(|&t| {
                let t = t as f64;
                t * (t - 1.0) * (2.0 * t + 5.0)
            })
            .sum::<f64>()
    };
    let t2 = |ts: &[usize]| ts.iter().map(|&t| (t * (t - 1)) as f64).sum::<f64>();
    let t3 = |ts: &[usize]| ts.iter().map(|&t| (t * (t - 1) * (t - 2)) as f64).sum::<f64>();
    let mut var_s = (v0 - vt(&tx) - vt(&ty)) / 18.0;
    var_s += t2(&tx) * t2(&ty) / (2.0 * nf * (nf - 1.0));
    if n > 2 {
        var_s += t3(&tx) * t3(&ty) / (9.0 * nf * (nf - 1.0) * (nf - 2.0));
    }
    let pv = if var_s > 0.0 {
        norm_two_sided_p(s / var_s.sqrt())
    } else {
        1.0
    };
    Some((tau, pv))
}

impl MethodPlugin for Kendall {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "kendall",
            description: "Kendall tau-b rank correlation",
            usage: "kendall(X, Y)",
            args: &XY_ARGS,
            returns: "{tau, p, significant, n}",
            family: Family::Correlational,
            related: &KENDALL_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        let (x, y) = common_pair(&p.X, &p.Y);
        require_len("kendall", x.len(), 3)?;
        let (tau, pv) = kendall_tau(x, y)
            .ok_or_else(|| StatError::degenerate("Correlation undefined: all values tied"))?;
        Ok(MethodResult::ok()
            .with("tau", tau)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("n", x.len()))
    }
}

// ============ Correlation Matrix ============

pub struct CorrelationMatrix;

static TABLE_ARGS: [ArgMeta; 2] = [
    ArgMeta::optional("data", "table", "Object of columns or 2-D array", "null"),
    ArgMeta::optional("X", "table", "Used when data is absent", "null"),
];

static CORRMAT_RELATED: [&str; 2] = ["pearson", "cronbach_alpha"];

impl MethodPlugin for CorrelationMatrix {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "correlation_matrix",
            description: "Pairwise Pearson correlation matrix across table columns",
            usage: "correlation_matrix(data)",
            args: &TABLE_ARGS,
            returns: "{matrix, columns}",
            family: Family::Correlational,
            related: &CORRMAT_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let table = parse::<TableParams>(params)?.resolve()?;
        if table.n_cols() < 2 {
            return Err(StatError::inapplicable("Need at least 2 variables"));
        }
        require_len("correlation_matrix", table.n_rows(), 3)?;
        Ok(MethodResult::ok()
            .with_matrix("matrix", &helpers::correlation_rows(&table))
            .with("columns", table.columns().to_vec()))
    }
}
