//! Factor-analytic methods: PCA, EFA, KMO, Bartlett sphericity, CFA
//!
//! Everything works on the Pearson correlation matrix of the input table.
//! Factor extraction is iterated principal-axis factoring; EFA optionally
//! applies a Kaiser-normalised varimax rotation.

use crate::distributions::chi2_sf;
use crate::helpers::{self, matrix_rows, require_len, significant, TableParams};
use maac_core::DataTable;
use maac_plugin::prelude::*;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Deserialize;
use serde_json::json;

const PAF_MAX_ITER: usize = 200;
const PAF_TOL: f64 = 1e-6;
const VARIMAX_MAX_ITER: usize = 500;

static TABLE_ARGS: [ArgMeta; 2] = [
    ArgMeta::optional("data", "table", "Variables as columns", "null"),
    ArgMeta::optional("X", "table", "Used when data is absent", "null"),
];

static FACTOR_RELATED: [&str; 5] = ["pca", "efa", "kmo", "bartlett_sphericity", "cfa"];

// ============ Linear algebra ============

/// Eigen-decomposition with eigenvalues sorted in descending order
fn sorted_eigen(m: DMatrix<f64>) -> (Vec<f64>, DMatrix<f64>) {
    let n = m.nrows();
    let eig = SymmetricEigen::new(m);
    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let values = idx.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = DMatrix::from_fn(n, n, |r, c| eig.eigenvectors[(r, idx[c])]);
    (values, vectors)
}

/// Flip each column so its largest-magnitude entry is positive
fn orient_columns(m: &mut DMatrix<f64>) {
    for j in 0..m.ncols() {
        let pivot = m
            .column(j)
            .iter()
            .copied()
            .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            m.column_mut(j).neg_mut();
        }
    }
}

/// Inverse of a correlation matrix; near-singular input is degenerate
fn invert_correlation(r: &DMatrix<f64>) -> Result<DMatrix<f64>, StatError> {
    if r.determinant().abs() < 1e-12 {
        return Err(StatError::degenerate("Correlation matrix is singular"));
    }
    r.clone()
        .try_inverse()
        .ok_or_else(|| StatError::degenerate("Correlation matrix is singular"))
}

fn table_correlation(table: &DataTable, min_rows: usize, min_cols: usize, method: &str) -> Result<DMatrix<f64>, StatError> {
    if table.n_cols() < min_cols {
        return Err(StatError::inapplicable(format!(
            "{}() requires at least {} variables, got {}",
            method,
            min_cols,
            table.n_cols()
        )));
    }
    require_len(method, table.n_rows(), min_rows)?;
    helpers::correlation_matrix(table)
}

pub(crate) struct PafFit {
    /// Variables as rows, factors as columns
    pub loadings: DMatrix<f64>,
    pub communalities: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Iterated principal-axis factoring of a correlation matrix
pub(crate) fn principal_axis(r: &DMatrix<f64>, n_factors: usize) -> PafFit {
    let p = r.nrows();
    // Squared multiple correlations as starting communalities
    let mut h2: Vec<f64> = match invert_correlation(r) {
        Ok(inv) => (0..p).map(|i| (1.0 - 1.0 / inv[(i, i)]).clamp(0.0, 1.0)).collect(),
        Err(_) => (0..p)
            .map(|i| {
                (0..p)
                    .filter(|&j| j != i)
                    .map(|j| r[(i, j)].abs())
                    .fold(0.0, f64::max)
            })
            .collect(),
    };

    let mut loadings = DMatrix::zeros(p, n_factors);
    let mut iterations = 0;
    let mut converged = false;
    while iterations < PAF_MAX_ITER {
        iterations += 1;
        let mut reduced = r.clone();
        for (i, h) in h2.iter().enumerate() {
            reduced[(i, i)] = *h;
        }
        let (values, vectors) = sorted_eigen(reduced);
        loadings = DMatrix::from_fn(p, n_factors, |i, j| vectors[(i, j)] * values[j].max(0.0).sqrt());
        let next: Vec<f64> = (0..p)
            .map(|i| loadings.row(i).norm_squared().min(1.0))
            .collect();
        let delta = next
            .iter()
            .zip(&h2)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        h2 = next;
        if delta < PAF_TOL {
            converged = true;
            break;
        }
    }
    orient_columns(&mut loadings);
    PafFit {
        loadings,
        communalities: h2,
        iterations,
        converged,
    }
}

/// Varimax rotation with Kaiser row normalisation
pub(crate) fn varimax(loadings: &DMatrix<f64>) -> Result<DMatrix<f64>, StatError> {
    let (p, k) = loadings.shape();
    if k < 2 {
        return Ok(loadings.clone());
    }
    let h: Vec<f64> = (0..p).map(|i| loadings.row(i).norm()).collect();
    let phi = DMatrix::from_fn(p, k, |i, j| if h[i] > 0.0 { loadings[(i, j)] / h[i] } else { 0.0 });

    let mut rot = DMatrix::<f64>::identity(k, k);
    let mut d = 0.0;
    for _ in 0..VARIMAX_MAX_ITER {
        let lam = &phi * &rot;
        let col_ss = DVector::from_fn(k, |j, _| lam.column(j).norm_squared());
        let target = DMatrix::from_fn(p, k, |i, j| {
            lam[(i, j)].powi(3) - lam[(i, j)] * col_ss[j] / p as f64
        });
        let svd = (phi.transpose() * target).svd(true, true);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => return Err(StatError::kernel_fault("varimax rotation failed to decompose")),
        };
        rot = u * v_t;
        let d_old = d;
        d = svd.singular_values.sum();
        if d_old != 0.0 && d / d_old < 1.0 + 1e-6 {
            break;
        }
    }
    let rotated = &phi * &rot;
    let mut out = DMatrix::from_fn(p, k, |i, j| rotated[(i, j)] * h[i]);
    orient_columns(&mut out);
    Ok(out)
}

/// Overall and per-variable Kaiser-Meyer-Olkin measure
pub(crate) fn kmo(r: &DMatrix<f64>) -> Result<(f64, Vec<f64>), StatError> {
    let inv = invert_correlation(r)?;
    let p = r.nrows();
    let partial = |i: usize, j: usize| -inv[(i, j)] / (inv[(i, i)] * inv[(j, j)]).sqrt();

    let mut per_var = Vec::with_capacity(p);
    let (mut r_all, mut p_all) = (0.0, 0.0);
    for j in 0..p {
        let (mut r2, mut p2) = (0.0, 0.0);
        for i in (0..p).filter(|&i| i != j) {
            r2 += r[(i, j)].powi(2);
            p2 += partial(i, j).powi(2);
        }
        per_var.push(r2 / (r2 + p2));
        r_all += r2;
        p_all += p2;
    }
    Ok((r_all / (r_all + p_all), per_var))
}

pub fn kmo_label(k: f64) -> &'static str {
    if k < 0.5 {
        "unacceptable"
    } else if k < 0.6 {
        "miserable"
    } else if k < 0.7 {
        "mediocre"
    } else if k < 0.8 {
        "middling"
    } else if k < 0.9 {
        "meritorious"
    } else {
        "marvelous"
    }
}

/// Bartlett's test of sphericity: (chi-square, df, p)
pub(crate) fn sphericity(r: &DMatrix<f64>, n_rows: usize) -> Result<(f64, f64, f64), StatError> {
    let det = r.determinant();
    if det <= 1e-12 {
        return Err(StatError::degenerate("Correlation matrix is singular"));
    }
    let p = r.nrows() as f64;
    let n = n_rows as f64;
    let chi2 = -(n - 1.0 - (2.0 * p + 5.0) / 6.0) * det.ln();
    let df = p * (p - 1.0) / 2.0;
    Ok((chi2, df, chi2_sf(chi2, df)))
}

// ============ PCA ============

pub struct Pca;

static PCA_ARGS: [ArgMeta; 3] = [
    ArgMeta::optional("data", "table", "Variables as columns", "null"),
    ArgMeta::optional("X", "table", "Used when data is absent", "null"),
    ArgMeta::optional("n_components", "number", "Components to keep", "min(rows, cols)"),
];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct PcaParams {
    #[serde(default)]
    data: Option<DataTable>,
    #[serde(default)]
    X: Option<DataTable>,
    #[serde(default)]
    n_components: Option<usize>,
}

impl MethodPlugin for Pca {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "pca",
            description: "Principal component analysis of standardised variables",
            usage: "pca(data, n_components=None)",
            args: &PCA_ARGS,
            returns: "{eigenvalues, explained_variance_ratio, cumulative_variance, loadings, significant_components, n_components}",
            family: Family::Factor,
            related: &FACTOR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: PcaParams = parse(params)?;
        let table = helpers::resolve_table(p.data, p.X)?;
        let r = table_correlation(&table, 3, 2, "pca")?;
        let (n, k) = (table.n_rows(), table.n_cols());
        let max_comp = n.min(k);
        let n_comp = p.n_components.unwrap_or(max_comp);
        if n_comp == 0 || n_comp > max_comp {
            return Err(StatError::invalid_params(format!(
                "n_components must be between 1 and {}, got {}",
                max_comp, n_comp
            )));
        }

        let (values, mut vectors) = sorted_eigen(r);
        orient_columns(&mut vectors);
        // Covariance of z-scores with ddof 1 is R scaled by n / (n - 1)
        let scale = n as f64 / (n as f64 - 1.0);
        let eigenvalues: Vec<f64> = values[..n_comp].iter().map(|v| v.max(0.0) * scale).collect();
        let ratios: Vec<f64> = values[..n_comp].iter().map(|v| v.max(0.0) / k as f64).collect();
        let components: Vec<Vec<f64>> = (0..n_comp)
            .map(|c| vectors.column(c).iter().copied().collect())
            .collect();

        Ok(MethodResult::ok()
            .with("significant_components", eigenvalues.iter().filter(|&&e| e > 1.0).count())
            .with_floats("eigenvalues", &eigenvalues)
            .with_floats("explained_variance_ratio", &ratios)
            .with("cumulative_variance", ratios.iter().sum::<f64>())
            .with_matrix("loadings", &components)
            .with("n_components", n_comp))
    }
}

// ============ EFA ============

pub struct Efa;

static EFA_ARGS: [ArgMeta; 4] = [
    ArgMeta::optional("data", "table", "Variables as columns (>= 10 rows, >= 3 columns)", "null"),
    ArgMeta::optional("X", "table", "Used when data is absent", "null"),
    ArgMeta::optional("n_factors", "number", "Factors to extract", "3"),
    ArgMeta::optional("rotation", "string", "varimax | none", "varimax"),
];

fn default_efa_factors() -> usize {
    3
}

fn default_rotation() -> String {
    "varimax".to_string()
}

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct EfaParams {
    #[serde(default)]
    data: Option<DataTable>,
    #[serde(default)]
    X: Option<DataTable>,
    #[serde(default = "default_efa_factors")]
    n_factors: usize,
    #[serde(default = "default_rotation")]
    rotation: String,
}

fn check_factors(n_factors: usize, n_cols: usize) -> Result<(), StatError> {
    if n_factors == 0 || n_factors > n_cols {
        return Err(StatError::invalid_params(format!(
            "n_factors must be between 1 and {} (number of variables), got {}",
            n_cols, n_factors
        )));
    }
    Ok(())
}

impl MethodPlugin for Efa {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "efa",
            description: "Exploratory factor analysis (principal axis, optional varimax)",
            usage: "efa(data, n_factors=3, rotation='varimax')",
            args: &EFA_ARGS,
            returns: "{loadings, communalities, uniqueness, eigenvalues, n_factors, rotation}",
            family: Family::Factor,
            related: &FACTOR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: EfaParams = parse(params)?;
        let rotate = match p.rotation.as_str() {
            "varimax" => true,
            "none" => false,
            other => {
                return Err(StatError::invalid_params(format!(
                    "unknown rotation '{}' (expected varimax or none)",
                    other
                )))
            }
        };
        let table = helpers::resolve_table(p.data, p.X)?;
        let r = table_correlation(&table, 10, 3, "efa")?;
        check_factors(p.n_factors, table.n_cols())?;

        let fit = principal_axis(&r, p.n_factors);
        let loadings = if rotate { varimax(&fit.loadings)? } else { fit.loadings };
        let (eigenvalues, _) = sorted_eigen(r);
        let uniqueness: Vec<f64> = fit.communalities.iter().map(|h| 1.0 - h).collect();

        Ok(MethodResult::ok()
            .with_matrix("loadings", &matrix_rows(&loadings))
            .with_floats("communalities", &fit.communalities)
            .with_floats("uniqueness", &uniqueness)
            .with_floats("eigenvalues", &eigenvalues)
            .with("n_factors", p.n_factors)
            .with("rotation", p.rotation))
    }
}

// ============ KMO ============

pub struct Kmo;

impl MethodPlugin for Kmo {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "kmo",
            description: "Kaiser-Meyer-Olkin measure of sampling adequacy",
            usage: "kmo(data)",
            args: &TABLE_ARGS,
            returns: "{kmo, kmo_per_variable, interpretation, adequate}",
            family: Family::Factor,
            related: &FACTOR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let table = parse::<TableParams>(params)?.resolve()?;
        let r = table_correlation(&table, 3, 2, "kmo")?;
        let (overall, per_var) = kmo(&r)?;
        Ok(MethodResult::ok()
            .with("kmo", overall)
            .with_floats("kmo_per_variable", &per_var)
            .with("interpretation", kmo_label(overall))
            .with("adequate", overall >= 0.6))
    }
}

// ============ Bartlett sphericity ============

pub struct BartlettSphericity;

static MATRIX_ARGS: [ArgMeta; 1] = [ArgMeta::required("X", "table", "2-D data, variables as columns")];

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct MatrixParams {
    X: DataTable,
}

fn require_matrix(table: &DataTable, method: &str) -> Result<(), StatError> {
    if table.is_flat() {
        return Err(StatError::inapplicable(format!("{}() requires 2D data (matrix)", method)));
    }
    Ok(())
}

impl MethodPlugin for BartlettSphericity {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "bartlett_sphericity",
            description: "Bartlett's test that the correlation matrix is an identity",
            usage: "bartlett_sphericity(X)",
            args: &MATRIX_ARGS,
            returns: "{chi_square, df, p_value, significant, suitable_for_factor_analysis}",
            family: Family::Factor,
            related: &FACTOR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: MatrixParams = parse(params)?;
        require_matrix(&p.X, "bartlett_sphericity")?;
        let r = table_correlation(&p.X, 3, 2, "bartlett_sphericity")?;
        let (chi2, df, pv) = sphericity(&r, p.X.n_rows())?;
        Ok(MethodResult::ok()
            .with("chi_square", chi2)
            .with("df", df)
            .with("p_value", pv)
            .with("significant", significant(pv))
            .with("suitable_for_factor_analysis", significant(pv)))
    }
}

// ============ CFA ============

pub struct Cfa;

static CFA_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("X", "table", "2-D data (>= 10 rows)"),
    ArgMeta::optional("n_factors", "number", "Factors to confirm", "2"),
];

fn default_cfa_factors() -> usize {
    2
}

#[derive(Deserialize)]
#[allow(non_snake_case)]
struct CfaParams {
    X: DataTable,
    #[serde(default = "default_cfa_factors")]
    n_factors: usize,
}

impl MethodPlugin for Cfa {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "cfa",
            description: "Factor structure confirmation from an unrotated principal-axis solution",
            usage: "cfa(X, n_factors=2)",
            args: &CFA_ARGS,
            returns: "{n_factors, loadings, communalities, variance_explained, total_variance_explained, model_fit}",
            family: Family::Factor,
            related: &FACTOR_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: CfaParams = parse(params)?;
        require_matrix(&p.X, "cfa")?;
        let r = table_correlation(&p.X, 10, 2, "cfa")?;
        check_factors(p.n_factors, p.X.n_cols())?;

        let fit = principal_axis(&r, p.n_factors);
        let n_vars = p.X.n_cols() as f64;
        let variance: Vec<f64> = (0..p.n_factors)
            .map(|j| fit.loadings.column(j).norm_squared() / n_vars)
            .collect();

        Ok(MethodResult::ok()
            .with("n_factors", p.n_factors)
            .with_matrix("loadings", &matrix_rows(&fit.loadings))
            .with_floats("communalities", &fit.communalities)
            .with_floats("variance_explained", &variance)
            .with("total_variance_explained", variance.iter().sum::<f64>())
            .with(
                "model_fit",
                json!({
                    "converged": fit.converged,
                    "method": "principal_axis",
                    "n_iter": fit.iterations,
                }),
            ))
    }
}
