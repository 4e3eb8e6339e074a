//! Bootstrap confidence intervals: percentile and BCa
//!
//! Resampling draws from `helpers::rng`, seeded by the call's `seed`
//! parameter or the context seed, so runs are reproducible when either is set.

use crate::distributions::{norm_cdf, norm_ppf};
use crate::helpers::{self, require_len};
use maac_core::NumericSeries;
use maac_plugin::prelude::*;
use rand::Rng;
use serde::Deserialize;

static BOOTSTRAP_RELATED: [&str; 2] = ["bootstrap_ci", "bootstrap_bca"];

const DEFAULT_ITERATIONS: usize = 1000;
/// Upper bound on resamples per call; the replicate buffer is allocated up front
pub const MAX_ITERATIONS: usize = 100_000;
const DEFAULT_LEVEL: f64 = 0.95;

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

fn check_iterations(n: usize) -> Result<(), StatError> {
    if n == 0 || n > MAX_ITERATIONS {
        return Err(StatError::invalid_params(format!(
            "n_iterations must be between 1 and {}, got {}",
            MAX_ITERATIONS, n
        )));
    }
    Ok(())
}

fn check_level(level: f64) -> Result<(), StatError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(StatError::invalid_params(format!(
            "confidence level must be in (0, 1), got {}",
            level
        )));
    }
    Ok(())
}

/// Statistic recomputed on every resample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statistic {
    Mean,
    Median,
    Std,
}

impl Statistic {
    /// Unrecognised names fall back to the mean
    pub fn from_name(name: &str) -> Self {
        match name {
            "median" => Statistic::Median,
            "std" => Statistic::Std,
            _ => Statistic::Mean,
        }
    }

    pub fn eval(&self, xs: &[f64]) -> f64 {
        match self {
            Statistic::Mean => helpers::mean(xs),
            Statistic::Median => helpers::median(xs),
            Statistic::Std => helpers::std_dev(xs, 1.0),
        }
    }
}

/// `iterations` statistics of resamples drawn with replacement
pub(crate) fn resample<R: Rng>(xs: &[f64], stat: Statistic, iterations: usize, rng: &mut R) -> Vec<f64> {
    let n = xs.len();
    let mut buf = vec![0.0; n];
    (0..iterations)
        .map(|_| {
            for slot in buf.iter_mut() {
                *slot = xs[rng.gen_range(0..n)];
            }
            stat.eval(&buf)
        })
        .collect()
}

// ============ Percentile bootstrap ============

pub struct BootstrapCi;

static CI_ARGS: [ArgMeta; 6] = [
    ArgMeta::required("X", "series", "Sample"),
    ArgMeta::optional("statistic", "string", "mean | median | std", "mean"),
    ArgMeta::optional("n_iterations", "number", "Resamples, at most 100000", "1000"),
    ArgMeta::optional("ci", "number", "Confidence level", "0.95"),
    ArgMeta::optional("confidence_level", "number", "Confidence level, overrides ci", "null"),
    ArgMeta::optional("seed", "number", "Resampling seed", "null"),
];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct CiParams {
    X: NumericSeries,
    #[serde(default)]
    statistic: Option<String>,
    #[serde(default = "default_iterations")]
    n_iterations: usize,
    #[serde(default)]
    ci: Option<f64>,
    #[serde(default)]
    confidence_level: Option<f64>,
    #[serde(default)]
    seed: Option<u64>,
}

impl MethodPlugin for BootstrapCi {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "bootstrap_ci",
            description: "Percentile bootstrap confidence interval of the mean, median or std",
            usage: "bootstrap_ci(X, statistic='mean', n_iterations=1000, ci=0.95)",
            args: &CI_ARGS,
            returns: "{statistic, estimate, ci_lower, ci_upper, se, n_iterations, ci_level}",
            family: Family::Bootstrap,
            related: &BOOTSTRAP_RELATED,
        }
    }

    fn call(&self, params: &Params, ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: CiParams = parse(params)?;
        let level = p.confidence_level.or(p.ci).unwrap_or(DEFAULT_LEVEL);
        check_level(level)?;
        check_iterations(p.n_iterations)?;
        require_len("bootstrap_ci", p.X.len(), 2)?;

        let name = p.statistic.unwrap_or_else(|| "mean".to_string());
        let stat = Statistic::from_name(&name);
        let mut rng = helpers::rng(ctx.seed_for(p.seed));
        let mut reps = resample(&p.X, stat, p.n_iterations, &mut rng);
        reps.sort_by(f64::total_cmp);

        let alpha = 1.0 - level;
        Ok(MethodResult::ok()
            .with("statistic", name)
            .with("estimate", stat.eval(&p.X))
            .with("ci_lower", helpers::percentile_sorted(&reps, alpha / 2.0 * 100.0))
            .with("ci_upper", helpers::percentile_sorted(&reps, (1.0 - alpha / 2.0) * 100.0))
            .with("se", helpers::std_dev(&reps, 0.0))
            .with("n_iterations", p.n_iterations)
            .with("ci_level", level))
    }
}

// ============ BCa bootstrap ============

pub struct BootstrapBca;

static BCA_ARGS: [ArgMeta; 4] = [
    ArgMeta::required("X", "series", "Sample (n >= 10)"),
    ArgMeta::optional("confidence_level", "number", "Confidence level", "0.95"),
    ArgMeta::optional("n_iterations", "number", "Resamples, at most 100000", "1000"),
    ArgMeta::optional("seed", "number", "Resampling seed", "null"),
];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct BcaParams {
    X: NumericSeries,
    #[serde(default)]
    confidence_level: Option<f64>,
    #[serde(default = "default_iterations")]
    n_iterations: usize,
    #[serde(default)]
    seed: Option<u64>,
}

/// Jackknife acceleration of the mean
fn acceleration(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let total: f64 = xs.iter().sum();
    let jack: Vec<f64> = xs.iter().map(|x| (total - x) / (n - 1.0)).collect();
    let jm = helpers::mean(&jack);
    let num: f64 = jack.iter().map(|j| (jm - j).powi(3)).sum();
    let den = 6.0 * jack.iter().map(|j| (jm - j).powi(2)).sum::<f64>().powf(1.5);
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl MethodPlugin for BootstrapBca {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "bootstrap_bca",
            description: "Bias-corrected and accelerated bootstrap interval of the mean",
            usage: "bootstrap_bca(X, confidence_level=0.95, n_iterations=1000)",
            args: &BCA_ARGS,
            returns: "{estimate, ci_lower, ci_upper, bias_correction, acceleration, ci_level, n_iterations}",
            family: Family::Bootstrap,
            related: &BOOTSTRAP_RELATED,
        }
    }

    fn call(&self, params: &Params, ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: BcaParams = parse(params)?;
        let level = p.confidence_level.unwrap_or(DEFAULT_LEVEL);
        check_level(level)?;
        check_iterations(p.n_iterations)?;
        require_len("bootstrap_bca", p.X.len(), 10)?;
        if helpers::is_constant(&p.X) {
            return Err(StatError::degenerate("All values are identical"));
        }

        let theta = helpers::mean(&p.X);
        let mut rng = helpers::rng(ctx.seed_for(p.seed));
        let mut reps = resample(&p.X, Statistic::Mean, p.n_iterations, &mut rng);
        reps.sort_by(f64::total_cmp);

        // Keep the proportion off 0 and 1 so the bias correction stays finite
        let b = reps.len() as f64;
        let below = reps.iter().filter(|&&r| r < theta).count() as f64;
        let prop = (below / b).clamp(1.0 / (b + 1.0), b / (b + 1.0));
        let z0 = norm_ppf(prop);
        let a = acceleration(&p.X);

        let alpha = 1.0 - level;
        let adjust = |z: f64| norm_cdf(z0 + (z0 + z) / (1.0 - a * (z0 + z)));
        let a1 = adjust(norm_ppf(alpha / 2.0));
        let a2 = adjust(norm_ppf(1.0 - alpha / 2.0));

        Ok(MethodResult::ok()
            .with("estimate", theta)
            .with("ci_lower", helpers::percentile_sorted(&reps, a1 * 100.0))
            .with("ci_upper", helpers::percentile_sorted(&reps, a2 * 100.0))
            .with("bias_correction", z0)
            .with("acceleration", a)
            .with("ci_level", level)
            .with("n_iterations", p.n_iterations))
    }
}
