//! Helper functions for statistical operations
//!
//! Common parameter shapes, input validation and the small numeric
//! building blocks shared by every method family.

use maac_core::{DataTable, NumericSeries, StatError};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

// ============ Parameter shapes ============

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct XParams {
    pub X: NumericSeries,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct XYParams {
    pub X: NumericSeries,
    pub Y: NumericSeries,
}

#[derive(Debug, Deserialize)]
pub struct GroupsParams {
    pub groups: Vec<NumericSeries>,
}

/// Table input accepted under either `data` or `X`
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
pub struct TableParams {
    #[serde(default)]
    pub data: Option<DataTable>,
    #[serde(default)]
    pub X: Option<DataTable>,
}

impl TableParams {
    /// `data` takes precedence over `X`
    pub fn resolve(self) -> Result<DataTable, StatError> {
        resolve_table(self.data, self.X)
    }
}

pub fn resolve_table(data: Option<DataTable>, x: Option<DataTable>) -> Result<DataTable, StatError> {
    data.or(x)
        .ok_or_else(|| StatError::invalid_params("missing field `data` (or `X`)"))
}

// ============ Validation ============

/// Require at least `min` values
pub fn require_len(method: &str, n: usize, min: usize) -> Result<(), StatError> {
    if n < min {
        Err(StatError::too_few(method, min, n))
    } else {
        Ok(())
    }
}

/// Require at least two groups with at least two values each
pub fn require_groups(method: &str, groups: &[NumericSeries]) -> Result<(), StatError> {
    if groups.len() < 2 {
        return Err(StatError::inapplicable(format!(
            "{}() requires at least 2 groups, got {}",
            method,
            groups.len()
        )));
    }
    if let Some((i, g)) = groups.iter().enumerate().find(|(_, g)| g.len() < 2) {
        return Err(StatError::inapplicable(format!(
            "{}() requires at least 2 values per group, group {} has {}",
            method,
            i,
            g.len()
        )));
    }
    Ok(())
}

/// Truncate two series to their common length
pub fn common_pair<'a>(x: &'a [f64], y: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let n = x.len().min(y.len());
    (&x[..n], &y[..n])
}

pub fn significant(p: f64) -> bool {
    p < 0.05
}

// ============ Moments ============

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Variance with `ddof` delta degrees of freedom; NaN when n <= ddof
pub fn variance(xs: &[f64], ddof: f64) -> f64 {
    let denom = xs.len() as f64 - ddof;
    if denom <= 0.0 {
        return f64::NAN;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / denom
}

pub fn std_dev(xs: &[f64], ddof: f64) -> f64 {
    variance(xs, ddof).sqrt()
}

/// Biased (population) skewness
pub fn skewness(xs: &[f64]) -> f64 {
    let m = mean(xs);
    let n = xs.len() as f64;
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    let m3 = xs.iter().map(|x| (x - m).powi(3)).sum::<f64>() / n;
    if m2 == 0.0 {
        return f64::NAN;
    }
    m3 / m2.powf(1.5)
}

/// Biased Fisher excess kurtosis
pub fn excess_kurtosis(xs: &[f64]) -> f64 {
    let m = mean(xs);
    let n = xs.len() as f64;
    let m2 = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
    let m4 = xs.iter().map(|x| (x - m).powi(4)).sum::<f64>() / n;
    if m2 == 0.0 {
        return f64::NAN;
    }
    m4 / (m2 * m2) - 3.0
}

// ============ Order statistics ============

pub fn sorted(xs: &[f64]) -> Vec<f64> {
    let mut v = xs.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

pub fn median(xs: &[f64]) -> f64 {
    percentile_sorted(&sorted(xs), 50.0)
}

/// Linear-interpolation percentile of sorted data, `q` in [0, 100]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// 1-based average ranks (ties share the mean of their positions)
pub fn ranks(xs: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..xs.len()).collect();
    idx.sort_by(|&a, &b| xs[a].total_cmp(&xs[b]));

    let mut out = vec![0.0; xs.len()];
    let mut i = 0;
    while i < idx.len() {
        let mut j = i;
        while j + 1 < idx.len() && xs[idx[j + 1]] == xs[idx[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &idx[i..=j] {
            out[k] = avg;
        }
        i = j + 1;
    }
    out
}

/// Sizes of runs of equal values (ties), singletons excluded
pub fn tie_counts(xs: &[f64]) -> Vec<usize> {
    let s = sorted(xs);
    let mut counts = Vec::new();
    let mut i = 0;
    while i < s.len() {
        let mut j = i;
        while j + 1 < s.len() && s[j + 1] == s[i] {
            j += 1;
        }
        if j > i {
            counts.push(j - i + 1);
        }
        i = j + 1;
    }
    counts
}

// ============ Correlation ============

/// True when every value equals the first
pub fn is_constant(xs: &[f64]) -> bool {
    xs.iter().all(|&x| x == xs[0])
}

/// Pearson r; `None` when either side has zero variance
pub fn pearson_r(x: &[f64], y: &[f64]) -> Option<f64> {
    let (x, y) = common_pair(x, y);
    if x.len() < 2 || is_constant(x) || is_constant(y) {
        return None;
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Pairwise Pearson matrix of table columns; undefined entries are NaN
pub fn correlation_rows(table: &DataTable) -> Vec<Vec<f64>> {
    let k = table.n_cols();
    let mut m = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = pearson_r(table.column(i), table.column(j)).unwrap_or(f64::NAN);
            m[i][j] = r;
            m[j][i] = r;
        }
    }
    m
}

/// Correlation matrix as an nalgebra matrix; zero-variance columns are an error
pub fn correlation_matrix(table: &DataTable) -> Result<DMatrix<f64>, StatError> {
    if let Some((name, _)) = table
        .iter_columns()
        .find(|(_, col)| col.len() < 2 || is_constant(col))
    {
        return Err(StatError::degenerate(format!("column '{}' has zero variance", name)));
    }
    let rows = correlation_rows(table);
    let k = table.n_cols();
    Ok(DMatrix::from_fn(k, k, |i, j| rows[i][j]))
}

/// Observations as an (n_rows x n_cols) matrix
pub fn data_matrix(table: &DataTable) -> DMatrix<f64> {
    DMatrix::from_fn(table.n_rows(), table.n_cols(), |i, j| table.column(j)[i])
}

pub fn matrix_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows())
        .map(|i| (0..m.ncols()).map(|j| m[(i, j)]).collect())
        .collect()
}

// ============ Regression ============

/// Ordinary least squares fit with intercept
pub struct OlsFit {
    /// Intercept first, then one coefficient per predictor
    pub coef: Vec<f64>,
    pub se: Vec<f64>,
    pub df_resid: f64,
}

/// OLS of `y` on the given predictor columns
pub fn ols(y: &[f64], predictors: &[&[f64]]) -> Result<OlsFit, StatError> {
    let n = y.len();
    let p = predictors.len() + 1;
    if n <= p {
        return Err(StatError::too_few("ols", p + 1, n));
    }
    let x = DMatrix::from_fn(n, p, |i, j| if j == 0 { 1.0 } else { predictors[j - 1][i] });
    let yv = nalgebra::DVector::from_column_slice(y);
    let xtx = x.transpose() * &x;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| StatError::degenerate("design matrix is singular"))?;
    let beta = &xtx_inv * x.transpose() * &yv;
    let resid = &yv - &x * &beta;
    let df_resid = (n - p) as f64;
    let sigma2 = resid.dot(&resid) / df_resid;
    let se = (0..p).map(|j| (sigma2 * xtx_inv[(j, j)]).sqrt()).collect();
    Ok(OlsFit {
        coef: beta.iter().copied().collect(),
        se,
        df_resid,
    })
}

// ============ Randomness ============

/// Seeded generator, or entropy when no seed is given
pub fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_linear() {
        let s = sorted(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(percentile_sorted(&s, 50.0), 2.5);
        assert_eq!(percentile_sorted(&s, 25.0), 1.75);
        assert_eq!(percentile_sorted(&s, 100.0), 4.0);
    }

    #[test]
    fn test_ranks_with_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
        assert_eq!(tie_counts(&[1.0, 2.0, 2.0, 3.0, 3.0, 3.0]), vec![2, 3]);
    }

    #[test]
    fn test_variance_ddof() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(variance(&xs, 0.0), 4.0);
        assert!((variance(&xs, 1.0) - 32.0 / 7.0).abs() < 1e-12);
        assert!(variance(&[1.0], 1.0).is_nan());
    }

    #[test]
    fn test_pearson_zero_variance() {
        assert_eq!(pearson_r(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson_r(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), Some(1.0));
    }

    #[test]
    fn test_ols_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [3.1, 4.9, 7.2, 8.8, 11.0];
        let fit = ols(&y, &[&x]).unwrap();
        assert!((fit.coef[1] - 1.97).abs() < 1e-9);
        assert!((fit.coef[0] - 1.09).abs() < 1e-9);
        assert_eq!(fit.df_resid, 3.0);
    }
}
