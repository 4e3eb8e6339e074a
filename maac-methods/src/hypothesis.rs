//! Hypothesis testing: t-tests, ANOVA, and rank-based tests

use crate::distributions::{chi2_sf, f_sf, norm_sf, norm_two_sided_p, t_two_sided_p};
use crate::helpers::{
    self, common_pair, require_groups, require_len, significant, GroupsParams, XYParams,
};
use maac_core::NumericSeries;
use maac_plugin::prelude::*;
use serde::Deserialize;

static XY_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "First sample"),
    ArgMeta::required("Y", "series", "Second sample"),
];

static GROUPS_ARGS: [ArgMeta; 1] = [ArgMeta::required(
    "groups",
    "list<series>",
    "Two or more samples, each with at least 2 values",
)];

/// Sum of t^3 - t over tie groups
fn tie_term(values: &[f64]) -> f64 {
    helpers::tie_counts(values)
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum()
}

// ============ One-sample t-test ============

pub struct OneSampleTTest;

static ONE_SAMPLE_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "Sample"),
    ArgMeta::optional("popmean", "number", "Hypothesized population mean", "0"),
];

static T_RELATED: [&str; 4] = ["independent_ttest", "welch_ttest", "paired_ttest", "power_ttest"];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct OneSampleParams {
    X: NumericSeries,
    #[serde(default)]
    popmean: f64,
}

/// t statistic and two-sided p of a one-sample test
fn one_sample_t(xs: &[f64], popmean: f64) -> Result<(f64, f64), StatError> {
    let n = xs.len() as f64;
    let sd = helpers::std_dev(xs, 1.0);
    if helpers::is_constant(xs) || sd == 0.0 {
        return Err(StatError::degenerate("Standard deviation is zero"));
    }
    let t = (helpers::mean(xs) - popmean) / (sd / n.sqrt());
    Ok((t, t_two_sided_p(t, n - 1.0)))
}

impl MethodPlugin for OneSampleTTest {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "one_sample_ttest",
            description: "One-sample Student t-test against a population mean",
            usage: "one_sample_ttest(X, popmean=0)",
            args: &ONE_SAMPLE_ARGS,
            returns: "{t, p, significant, mean, popmean, n}",
            family: Family::Hypothesis,
            related: &T_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: OneSampleParams = parse(params)?;
        require_len("one_sample_ttest", p.X.len(), 2)?;
        let (t, pv) = one_sample_t(&p.X, p.popmean)?;
        Ok(MethodResult::ok()
            .with("t", t)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("mean", helpers::mean(&p.X))
            .with("popmean", p.popmean)
            .with("n", p.X.len()))
    }
}

// ============ Independent t-test ============

pub struct IndependentTTest;

static INDEPENDENT_ARGS: [ArgMeta; 3] = [
    ArgMeta::required("X", "series", "First sample"),
    ArgMeta::required("Y", "series", "Second sample"),
    ArgMeta::optional("equal_var", "bool", "Assume equal variances (Student) or not (Welch)", "true"),
];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct IndependentParams {
    X: NumericSeries,
    Y: NumericSeries,
    #[serde(default = "default_true")]
    equal_var: bool,
}

fn default_true() -> bool {
    true
}

fn independent_t(x: &[f64], y: &[f64], equal_var: bool) -> Result<MethodResult, StatError> {
    require_len("independent_ttest", x.len().min(y.len()), 2)?;
    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let (v1, v2) = (helpers::variance(x, 1.0), helpers::variance(y, 1.0));
    let diff = helpers::mean(x) - helpers::mean(y);

    let (se, df) = if equal_var {
        let df = n1 + n2 - 2.0;
        let pooled = ((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / df;
        ((pooled * (1.0 / n1 + 1.0 / n2)).sqrt(), df)
    } else {
        let a = v1 / n1;
        let b = v2 / n2;
        let df = (a + b).powi(2) / (a * a / (n1 - 1.0) + b * b / (n2 - 1.0));
        ((a + b).sqrt(), df)
    };
    if se == 0.0 || !se.is_finite() {
        return Err(StatError::degenerate("Standard error is zero"));
    }

    let t = diff / se;
    let pv = t_two_sided_p(t, df);
    Ok(MethodResult::ok()
        .with("t", t)
        .with("p", pv)
        .with("significant", significant(pv))
        .with("mean_x", helpers::mean(x))
        .with("mean_y", helpers::mean(y))
        .with("n_x", x.len())
        .with("n_y", y.len())
        .with("equal_var", equal_var))
}

impl MethodPlugin for IndependentTTest {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "independent_ttest",
            description: "Two independent samples t-test",
            usage: "independent_ttest(X, Y, equal_var=true)",
            args: &INDEPENDENT_ARGS,
            returns: "{t, p, significant, mean_x, mean_y, n_x, n_y, equal_var}",
            family: Family::Hypothesis,
            related: &T_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: IndependentParams = parse(params)?;
        independent_t(&p.X, &p.Y, p.equal_var)
    }
}

// ============ Welch t-test ============

pub struct WelchTTest;

impl MethodPlugin for WelchTTest {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "welch_ttest",
            description: "Welch's t-test (unequal variances)",
            usage: "welch_ttest(X, Y)",
            args: &XY_ARGS,
            returns: "{t, p, significant, mean_x, mean_y, n_x, n_y, equal_var}",
            family: Family::Hypothesis,
            related: &T_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        independent_t(&p.X, &p.Y, false)
    }
}

// ============ Paired t-test ============

pub struct PairedTTest;

impl MethodPlugin for PairedTTest {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "paired_ttest",
            description: "Paired samples t-test (truncated to the common length)",
            usage: "paired_ttest(X, Y)",
            args: &XY_ARGS,
            returns: "{t, p, significant, n}",
            family: Family::Hypothesis,
            related: &T_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        let (x, y) = common_pair(&p.X, &p.Y);
        require_len("paired_ttest", x.len(), 2)?;
        let d: Vec<f64> = x.iter().zip(y).map(|(a, b)| a - b).collect();
        let (t, pv) = one_sample_t(&d, 0.0)?;
        Ok(MethodResult::ok()
            .with("t", t)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("n", x.len()))
    }
}

// ============ One-way ANOVA ============

pub struct OneWayAnova;

static ANOVA_RELATED: [&str; 4] = ["kruskal_wallis", "levene", "eta_squared", "power_anova"];

impl MethodPlugin for OneWayAnova {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "one_way_anova",
            description: "One-way analysis of variance across groups",
            usage: "one_way_anova(groups)",
            args: &GROUPS_ARGS,
            returns: "{f, p, significant, k}",
            family: Family::Hypothesis,
            related: &ANOVA_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: GroupsParams = parse(params)?;
        require_groups("one_way_anova", &p.groups)?;

        let all: Vec<f64> = p.groups.iter().flat_map(|g| g.iter().copied()).collect();
        let grand = helpers::mean(&all);
        let k = p.groups.len() as f64;
        let n = all.len() as f64;

        let ss_between: f64 = p
            .groups
            .iter()
            .map(|g| g.len() as f64 * (helpers::mean(g) - grand).powi(2))
            .sum();
        let ss_within: f64 = p
            .groups
            .iter()
            .map(|g| {
                let m = helpers::mean(g);
                g.iter().map(|x| (x - m).powi(2)).sum::<f64>()
            })
            .sum();
        if ss_within == 0.0 {
            return Err(StatError::degenerate("Within-group variance is zero"));
        }

        let f = (ss_between / (k - 1.0)) / (ss_within / (n - k));
        let pv = f_sf(f, k - 1.0, n - k);
        Ok(MethodResult::ok()
            .with("f", f)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("k", p.groups.len()))
    }
}

// ============ Kruskal-Wallis ============

pub struct KruskalWallis;

static KRUSKAL_RELATED: [&str; 2] = ["one_way_anova", "mann_whitney"];

impl MethodPlugin for KruskalWallis {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "kruskal_wallis",
            description: "Kruskal-Wallis H-test (rank-based ANOVA, tie corrected)",
            usage: "kruskal_wallis(groups)",
            args: &GROUPS_ARGS,
            returns: "{h, p, significant, k}",
            family: Family::Hypothesis,
            related: &KRUSKAL_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: GroupsParams = parse(params)?;
        require_groups("kruskal_wallis", &p.groups)?;

        let all: Vec<f64> = p.groups.iter().flat_map(|g| g.iter().copied()).collect();
        let ranks = helpers::ranks(&all);
        let n = all.len() as f64;

        let mut offset = 0;
        let mut sum = 0.0;
        for g in &p.groups {
            let r: f64 = ranks[offset..offset + g.len()].iter().sum();
            sum += r * r / g.len() as f64;
            offset += g.len();
        }
        let h = 12.0 / (n * (n + 1.0)) * sum - 3.0 * (n + 1.0);
        let correction = 1.0 - tie_term(&all) / (n * n * n - n);
        if correction <= 0.0 {
            return Err(StatError::degenerate("All values are identical"));
        }
        let h = h / correction;
        let k = p.groups.len();
        let pv = chi2_sf(h, k as f64 - 1.0);
        Ok(MethodResult::ok()
            .with("h", h)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("k", k))
    }
}

// ============ Mann-Whitney U ============

pub struct MannWhitney;

static MW_RELATED: [&str; 2] = ["independent_ttest", "wilcoxon"];

impl MethodPlugin for MannWhitney {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "mann_whitney",
            description: "Mann-Whitney U test, two-sided normal approximation",
            usage: "mann_whitney(X, Y)",
            args: &XY_ARGS,
            returns: "{u, p, significant, n_x, n_y}",
            family: Family::Hypothesis,
            related: &MW_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: XYParams = parse(params)?;
        require_len("mann_whitney", p.X.len().min(p.Y.len()), 2)?;

        let (n1, n2) = (p.X.len() as f64, p.Y.len() as f64);
        let all: Vec<f64> = p.X.iter().chain(p.Y.iter()).copied().collect();
        let ranks = helpers::ranks(&all);
        let r1: f64 = ranks[..p.X.len()].iter().sum();
        let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
        let u2 = n1 * n2 - u1;

        let n = n1 + n2;
        let mu = n1 * n2 / 2.0;
        let sigma = (n1 * n2 / 12.0 * ((n + 1.0) - tie_term(&all) / (n * (n - 1.0)))).sqrt();
        if sigma == 0.0 {
            return Err(StatError::degenerate("All values are identical"));
        }
        let z = (u1.max(u2) - mu - 0.5) / sigma;
        let pv = (2.0 * norm_sf(z)).min(1.0);

        Ok(MethodResult::ok()
            .with("u", u1)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("n_x", p.X.len())
            .with("n_y", p.Y.len()))
    }
}

// ============ Wilcoxon signed-rank ============

pub struct Wilcoxon;

static WILCOXON_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "series", "Sample, or first of paired samples"),
    ArgMeta::optional("Y", "series", "Second paired sample", "null"),
];

static WILCOXON_RELATED: [&str; 2] = ["paired_ttest", "mann_whitney"];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct WilcoxonParams {
    X: NumericSeries,
    #[serde(default)]
    Y: Option<NumericSeries>,
}

impl MethodPlugin for Wilcoxon {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "wilcoxon",
            description: "Wilcoxon signed-rank test on X or on paired differences X - Y",
            usage: "wilcoxon(X, Y=null)",
            args: &WILCOXON_ARGS,
            returns: "{w, p, significant, n}",
            family: Family::Hypothesis,
            related: &WILCOXON_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: WilcoxonParams = parse(params)?;
        let diffs: Vec<f64> = match &p.Y {
            Some(y) => {
                let (x, y) = common_pair(&p.X, y);
                require_len("wilcoxon", x.len(), 2)?;
                x.iter().zip(y).map(|(a, b)| a - b).collect()
            }
            None => {
                require_len("wilcoxon", p.X.len(), 2)?;
                p.X.to_vec()
            }
        };

        let nonzero: Vec<f64> = diffs.into_iter().filter(|d| *d != 0.0).collect();
        if nonzero.is_empty() {
            return Err(StatError::degenerate("All differences are zero"));
        }
        let abs: Vec<f64> = nonzero.iter().map(|d| d.abs()).collect();
        let ranks = helpers::ranks(&abs);
        let w_plus: f64 = nonzero
            .iter()
            .zip(&ranks)
            .filter(|(d, _)| **d > 0.0)
            .map(|(_, r)| r)
            .sum();
        let n = nonzero.len() as f64;
        let w_minus = n * (n + 1.0) / 2.0 - w_plus;
        let w = w_plus.min(w_minus);

        let mean = n * (n + 1.0) / 4.0;
        let se = (n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_term(&abs) / 48.0).sqrt();
        let pv = if se > 0.0 {
            norm_two_sided_p((w - mean) / se)
        } else {
            1.0
        };

        Ok(MethodResult::ok()
            .with("w", w)
            .with("p", pv)
            .with("significant", significant(pv))
            .with("n", nonzero.len()))
    }
}
