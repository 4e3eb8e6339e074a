//! Distribution functions used for p-values, critical values and power.
//!
//! Central distributions are expressed through the regularized incomplete
//! beta and gamma functions from `statrs`; the noncentral t and F are
//! computed here.

use maac_core::StatError;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use statrs::function::beta::beta_reg;
use statrs::function::erf::{erfc, erfc_inv};
use statrs::function::gamma::{gamma_ur, ln_gamma};
use std::f64::consts::SQRT_2;

// ============ Normal ============

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal survival function
pub fn norm_sf(x: f64) -> f64 {
    0.5 * erfc(x / SQRT_2)
}

/// Standard normal quantile, `p` in (0, 1)
pub fn norm_ppf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Two-sided p-value of a standard normal statistic
pub fn norm_two_sided_p(z: f64) -> f64 {
    (2.0 * norm_sf(z.abs())).min(1.0)
}

// ============ Student's t ============

/// Two-sided p-value of a t statistic
pub fn t_two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    beta_reg(df / 2.0, 0.5, x.clamp(0.0, 1.0))
}

/// t CDF
pub fn t_cdf(t: f64, df: f64) -> f64 {
    let tail = 0.5 * t_two_sided_p(t, df);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// t quantile
pub fn t_ppf(p: f64, df: f64) -> Result<f64, StatError> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| StatError::inapplicable(format!("t distribution: {}", e)))?;
    Ok(dist.inverse_cdf(p))
}

// ============ Chi-squared ============

/// Chi-squared survival function
pub fn chi2_sf(x: f64, df: f64) -> f64 {
    if x.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    gamma_ur(df / 2.0, x / 2.0)
}

// ============ F ============

/// F survival function
pub fn f_sf(f: f64, d1: f64, d2: f64) -> f64 {
    if f.is_nan() || d1 <= 0.0 || d2 <= 0.0 {
        return f64::NAN;
    }
    if f <= 0.0 {
        return 1.0;
    }
    if f.is_infinite() {
        return 0.0;
    }
    let x = d2 / (d2 + d1 * f);
    beta_reg(d2 / 2.0, d1 / 2.0, x.clamp(0.0, 1.0))
}

/// Upper-tail critical value: F such that sf(F) = alpha
pub fn f_isf(alpha: f64, d1: f64, d2: f64) -> Result<f64, StatError> {
    let dist = FisherSnedecor::new(d1, d2)
        .map_err(|e| StatError::inapplicable(format!("F distribution: {}", e)))?;
    Ok(dist.inverse_cdf(1.0 - alpha))
}

// ============ Noncentral t ============

/// Noncentral t CDF.
///
/// With T = (Z + nc) / S and S = sqrt(V / df), P(T <= t) is the integral of
/// Phi(t s - nc) against the density of S, evaluated by Simpson's rule.
pub fn nct_cdf(t: f64, df: f64, nc: f64) -> f64 {
    if df <= 0.0 || t.is_nan() || nc.is_nan() {
        return f64::NAN;
    }
    let half = df / 2.0;
    let log_norm = half * df.ln() - (half - 1.0) * 2f64.ln() - ln_gamma(half);
    let density = |s: f64| {
        if s <= 0.0 {
            return 0.0;
        }
        (log_norm + (df - 1.0) * s.ln() - df * s * s / 2.0).exp()
    };

    let spread = 12.0 / df.sqrt();
    let lo = (1.0 - spread).max(1e-10);
    let hi = 1.0 + spread.max(8.0 / df.sqrt()) + if df < 5.0 { 6.0 } else { 0.0 };
    let steps = 4000;
    let h = (hi - lo) / steps as f64;

    let f = |s: f64| density(s) * norm_cdf(t * s - nc);
    let mut sum = f(lo) + f(hi);
    for i in 1..steps {
        let s = lo + i as f64 * h;
        sum += if i % 2 == 1 { 4.0 } else { 2.0 } * f(s);
    }
    (sum * h / 3.0).clamp(0.0, 1.0)
}

// ============ Noncentral F ============

/// Noncentral F survival function as a Poisson mixture of central betas
pub fn ncf_sf(f: f64, d1: f64, d2: f64, nc: f64) -> f64 {
    if f.is_nan() || d1 <= 0.0 || d2 <= 0.0 || nc < 0.0 {
        return f64::NAN;
    }
    if f <= 0.0 {
        return 1.0;
    }
    let x = (d1 * f / (d1 * f + d2)).clamp(0.0, 1.0);
    let lambda = nc / 2.0;

    // cdf = sum_j Poisson(j; lambda) * I_x(d1/2 + j, d2/2)
    let mut cdf = 0.0;
    let mut weight_total = 0.0;
    let max_terms = (lambda + 20.0 * lambda.sqrt() + 50.0) as usize;
    for j in 0..=max_terms {
        let jf = j as f64;
        let log_w = if lambda > 0.0 {
            -lambda + jf * lambda.ln() - ln_gamma(jf + 1.0)
        } else if j == 0 {
            0.0
        } else {
            break;
        };
        let w = log_w.exp();
        cdf += w * beta_reg(d1 / 2.0 + jf, d2 / 2.0, x);
        weight_total += w;
        if weight_total > 1.0 - 1e-14 && jf > lambda {
            break;
        }
    }
    (1.0 - cdf).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_normal() {
        assert!(close(norm_cdf(0.0), 0.5, 1e-12));
        assert!(close(norm_cdf(1.959964), 0.975, 1e-6));
        assert!(close(norm_ppf(0.975), 1.959964, 1e-5));
        assert!(close(norm_two_sided_p(1.959964), 0.05, 1e-6));
    }

    #[test]
    fn test_t() {
        // t(10) two-sided 5% critical value is 2.228139
        assert!(close(t_two_sided_p(2.228139, 10.0), 0.05, 1e-5));
        assert!(close(t_cdf(0.0, 5.0), 0.5, 1e-12));
        assert!(close(t_ppf(0.975, 10.0).unwrap(), 2.228139, 1e-4));
    }

    #[test]
    fn test_chi2_and_f() {
        // chi2(2) sf(x) = exp(-x/2)
        assert!(close(chi2_sf(3.0, 2.0), (-1.5f64).exp(), 1e-10));
        // F(2, 10) 5% critical value 4.102821
        assert!(close(f_sf(4.102821, 2.0, 10.0), 0.05, 1e-5));
        assert!(close(f_isf(0.05, 2.0, 10.0).unwrap(), 4.102821, 1e-3));
    }

    #[test]
    fn test_noncentral_reduces_to_central() {
        assert!(close(nct_cdf(2.228139, 10.0, 0.0), 0.975, 1e-5));
        assert!(close(ncf_sf(4.102821, 2.0, 10.0, 0.0), 0.05, 1e-6));
    }

    #[test]
    fn test_noncentral_shift() {
        // Larger noncentrality moves mass to the right
        assert!(nct_cdf(1.0, 20.0, 2.0) < nct_cdf(1.0, 20.0, 0.0));
        assert!(ncf_sf(3.0, 2.0, 30.0, 10.0) > f_sf(3.0, 2.0, 30.0));
    }
}
