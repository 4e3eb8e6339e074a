//! MAAC framework methods: score validation, per-dimension statistics,
//! framework coherence and multivariate suitability
//!
//! Scores follow the 1-5 rating scale used by every MAAC dimension.

use crate::factor::{kmo, sphericity};
use crate::helpers::{self, significant};
use crate::reliability::cronbach;
use maac_core::{float_json, parse_element, DataTable, NumericSeries};
use maac_plugin::prelude::*;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};

const SCALE_MIN: f64 = 1.0;
const SCALE_MAX: f64 = 5.0;
const VALIDITY_THRESHOLD: f64 = 0.95;
const HIGH_CORRELATION: f64 = 0.8;

static FRAMEWORK_RELATED: [&str; 4] = [
    "maac_scoring_validation",
    "maac_dimensional_statistics",
    "maac_framework_coherence",
    "maac_multivariate_validation",
];

/// Finite upper-triangle entries of a correlation matrix
fn upper_triangle(rows: &[Vec<f64>]) -> Vec<f64> {
    let k = rows.len();
    (0..k)
        .flat_map(|i| ((i + 1)..k).map(move |j| (i, j)))
        .map(|(i, j)| rows[i][j])
        .filter(|r| r.is_finite())
        .collect()
}

// ============ Scoring validation ============

pub struct ScoringValidation;

static SCORES_ARGS: [ArgMeta; 1] = [ArgMeta::required(
    "scores",
    "array",
    "Scores as a 1-D array or a 2-D array of rows (one column per dimension)",
)];

#[derive(Deserialize)]
struct ScoresParams {
    scores: Vec<JsonValue>,
}

/// Score grid with missing cells kept as `None`
fn score_grid(items: &[JsonValue]) -> Result<Vec<Vec<Option<f64>>>, StatError> {
    let rows: Vec<Vec<Option<f64>>> = items
        .iter()
        .map(|item| match item {
            JsonValue::Array(cells) => cells.iter().map(parse_element).collect(),
            scalar => parse_element(scalar).map(|v| vec![v]),
        })
        .collect::<Result<_, _>>()?;
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(i) = rows.iter().position(|r| r.len() != width) {
        return Err(StatError::invalid_params(format!(
            "row {} has {} scores, expected {}",
            i,
            rows[i].len(),
            width
        )));
    }
    Ok(rows)
}

impl MethodPlugin for ScoringValidation {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "maac_scoring_validation",
            description: "Range compliance (1-5) and completeness of a MAAC score matrix",
            usage: "maac_scoring_validation(scores)",
            args: &SCORES_ARGS,
            returns: "{n_samples, n_dimensions, range_compliance, data_quality, dimension_statistics, overall_valid}",
            family: Family::Framework,
            related: &FRAMEWORK_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: ScoresParams = parse(params)?;
        let grid = score_grid(&p.scores)?;
        let n_samples = grid.len();
        let n_dims = grid.first().map(Vec::len).unwrap_or(0);
        let cells = (n_samples * n_dims) as f64;
        if cells == 0.0 {
            return Err(StatError::inapplicable("No scores to validate"));
        }

        let finite = grid.iter().flatten().filter(|c| c.is_some()).count() as f64;
        let in_range = grid
            .iter()
            .flatten()
            .filter(|c| matches!(c, Some(v) if (SCALE_MIN..=SCALE_MAX).contains(v)))
            .count() as f64;
        let range_compliance = in_range / cells;
        let data_quality = finite / cells;

        let dims: Vec<JsonValue> = (0..n_dims)
            .filter_map(|j| {
                let col: Vec<f64> = grid.iter().filter_map(|row| row[j]).collect();
                if col.is_empty() {
                    return None;
                }
                let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some(json!({
                    "dimension": j,
                    "mean": float_json(helpers::mean(&col)),
                    "std": float_json(helpers::std_dev(&col, 0.0)),
                    "min": float_json(lo),
                    "max": float_json(hi),
                    "valid_pct": float_json(col.len() as f64 / n_samples as f64 * 100.0),
                }))
            })
            .collect();

        Ok(MethodResult::ok()
            .with("n_samples", n_samples)
            .with("n_dimensions", n_dims)
            .with("range_compliance", range_compliance)
            .with("data_quality", data_quality)
            .with("dimension_statistics", dims)
            .with(
                "overall_valid",
                range_compliance > VALIDITY_THRESHOLD && data_quality > VALIDITY_THRESHOLD,
            ))
    }
}

// ============ Dimensional statistics ============

pub struct DimensionalStatistics;

static DIMENSIONS_ARGS: [ArgMeta; 1] = [ArgMeta::required(
    "data",
    "object",
    "Dimension name -> score series (lengths may differ)",
)];

#[derive(Deserialize)]
struct DimensionsParams {
    data: Map<String, JsonValue>,
}

fn dimension_summary(values: &[f64]) -> JsonValue {
    let n = values.len();
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let opt = |ok: bool, v: f64| if ok { float_json(v) } else { JsonValue::Null };
    json!({
        "n": n,
        "mean": float_json(helpers::mean(values)),
        "std": opt(n > 1, helpers::std_dev(values, 1.0)),
        "median": float_json(helpers::median(values)),
        "min": float_json(lo),
        "max": float_json(hi),
        "range": float_json(hi - lo),
        "skew": opt(n > 2, helpers::skewness(values)),
        "kurtosis": opt(n > 3, helpers::excess_kurtosis(values)),
        "valid": true,
    })
}

impl MethodPlugin for DimensionalStatistics {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "maac_dimensional_statistics",
            description: "Descriptive profile of every MAAC dimension",
            usage: "maac_dimensional_statistics(data)",
            args: &DIMENSIONS_ARGS,
            returns: "{dimensions, n_dimensions}",
            family: Family::Framework,
            related: &FRAMEWORK_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: DimensionsParams = parse(params)?;
        let mut dims = Map::new();
        for (name, column) in &p.data {
            let items = column.as_array().ok_or_else(|| {
                StatError::invalid_params(format!("dimension '{}' is not an array", name))
            })?;
            let series = NumericSeries::from_json(items)?;
            let entry = if series.is_empty() {
                json!({"valid": false, "error": "No valid values"})
            } else {
                dimension_summary(&series)
            };
            dims.insert(name.clone(), entry);
        }
        Ok(MethodResult::ok()
            .with("n_dimensions", p.data.len())
            .with("dimensions", dims))
    }
}

// ============ Framework coherence ============

pub struct FrameworkCoherence;

static COHERENCE_ARGS: [ArgMeta; 1] = [ArgMeta::required(
    "scores",
    "table",
    "2-D score matrix, one column per dimension",
)];

#[derive(Deserialize)]
struct CoherenceParams {
    scores: DataTable,
}

fn coherence_level(alpha: f64) -> &'static str {
    if alpha >= 0.9 {
        "excellent"
    } else if alpha >= 0.8 {
        "good"
    } else if alpha >= 0.7 {
        "acceptable"
    } else if alpha >= 0.6 {
        "questionable"
    } else {
        "poor"
    }
}

impl MethodPlugin for FrameworkCoherence {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "maac_framework_coherence",
            description: "Inter-dimension correlation and internal consistency of MAAC scores",
            usage: "maac_framework_coherence(scores)",
            args: &COHERENCE_ARGS,
            returns: "{n_samples, n_dimensions, avg_inter_dimension_correlation, cronbach_alpha, coherence_level}",
            family: Family::Framework,
            related: &FRAMEWORK_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: CoherenceParams = parse(params)?;
        let table = p.scores;
        if table.is_flat() {
            return Err(StatError::inapplicable("Expected 2D score matrix"));
        }
        if table.n_rows() < 3 || table.n_cols() < 2 {
            return Err(StatError::inapplicable("Insufficient data for coherence analysis"));
        }

        let upper = upper_triangle(&helpers::correlation_rows(&table));
        let avg = if upper.is_empty() { 0.0 } else { helpers::mean(&upper) };
        // Zero total variance scores as no consistency
        let alpha = cronbach(&table).unwrap_or(0.0);

        Ok(MethodResult::ok()
            .with("n_samples", table.n_rows())
            .with("n_dimensions", table.n_cols())
            .with("avg_inter_dimension_correlation", avg)
            .with("cronbach_alpha", alpha)
            .with("coherence_level", coherence_level(alpha)))
    }
}

// ============ Multivariate validation ============

pub struct MultivariateValidation;

static MULTIVARIATE_ARGS: [ArgMeta; 1] = [ArgMeta::required(
    "data",
    "table",
    "Dimension name -> scores (>= 10 complete rows)",
)];

#[derive(Deserialize)]
struct MultivariateParams {
    data: DataTable,
}

impl MethodPlugin for MultivariateValidation {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "maac_multivariate_validation",
            description: "Factorability and multicollinearity screen of MAAC dimensions",
            usage: "maac_multivariate_validation(data)",
            args: &MULTIVARIATE_ARGS,
            returns: "{n_samples, n_dimensions, kmo?, bartlett_sphericity?, correlation_summary, multicollinearity}",
            family: Family::Framework,
            related: &FRAMEWORK_RELATED,
        }
    }

    fn call(&self, params: &Params, ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: MultivariateParams = parse(params)?;
        let table = p.data;
        if table.n_rows() < 10 {
            return Err(StatError::inapplicable(
                "Need at least 10 samples for multivariate validation",
            ));
        }
        if table.n_cols() < 2 {
            return Err(StatError::inapplicable("Need at least 2 dimensions"));
        }

        let mut result = MethodResult::ok()
            .with("n_samples", table.n_rows())
            .with("n_dimensions", table.n_cols());

        if ctx.capabilities.is_enabled(Capability::Factor) {
            let r = helpers::correlation_matrix(&table);
            let kmo_block = match r.as_ref().map_err(Clone::clone).and_then(kmo) {
                Ok((overall, per_var)) => {
                    let per: Map<String, JsonValue> = table
                        .columns()
                        .iter()
                        .zip(per_var)
                        .map(|(c, k)| (c.clone(), float_json(k)))
                        .collect();
                    json!({
                        "overall": float_json(overall),
                        "per_variable": per,
                        "adequate": overall >= 0.6,
                    })
                }
                Err(_) => json!({"valid": false, "error": "KMO calculation failed"}),
            };
            let bartlett_block = match r.and_then(|m| sphericity(&m, table.n_rows())) {
                Ok((chi2, _, pv)) => json!({
                    "chi_square": float_json(chi2),
                    "p_value": float_json(pv),
                    "significant": significant(pv),
                }),
                Err(_) => json!({"valid": false, "error": "Bartlett test failed"}),
            };
            result = result
                .with("kmo", kmo_block)
                .with("bartlett_sphericity", bartlett_block);
        }

        let rows = helpers::correlation_rows(&table);
        let upper = upper_triangle(&rows);
        let summary = if upper.is_empty() {
            json!({"mean_correlation": null, "max_correlation": null, "min_correlation": null})
        } else {
            json!({
                "mean_correlation": float_json(helpers::mean(&upper)),
                "max_correlation": float_json(upper.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                "min_correlation": float_json(upper.iter().copied().fold(f64::INFINITY, f64::min)),
            })
        };

        let names = table.columns();
        let mut high = Vec::new();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                if rows[i][j].abs() > HIGH_CORRELATION {
                    high.push(json!({"var1": names[i], "var2": names[j], "r": float_json(rows[i][j])}));
                }
            }
        }

        Ok(result
            .with("correlation_summary", summary)
            .with("multicollinearity", json!({ "high_correlations": high })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::{approx, params};

    fn ctx() -> CallContext {
        CallContext::new()
    }

    fn dimensions() -> JsonValue {
        json!({
            "clarity":   [4, 3, 5, 4, 2, 3, 4, 5, 3, 4, 2, 5],
            "depth":     [4, 3, 4, 4, 2, 3, 5, 5, 3, 4, 2, 4],
            "relevance": [3, 3, 5, 4, 3, 2, 4, 4, 3, 5, 2, 5]
        })
    }

    #[test]
    fn test_scoring_validation_ranges() {
        let r = ScoringValidation
            .call(&params(json!({"scores": [[1, 5], [3, 6], [2, null]]})), &ctx())
            .unwrap();
        assert_eq!(r.get_f64("n_samples"), Some(3.0));
        assert_eq!(r.get_f64("n_dimensions"), Some(2.0));
        assert!(approx(r.get_f64("range_compliance").unwrap(), 4.0 / 6.0, 1e-12));
        assert!(approx(r.get_f64("data_quality").unwrap(), 5.0 / 6.0, 1e-12));
        assert_eq!(r.get_bool("overall_valid"), Some(false));
        let dims = r.get("dimension_statistics").unwrap().as_array().unwrap();
        assert_eq!(dims[1]["max"], json!(6.0));
    }

    #[test]
    fn test_scoring_validation_flat_scores() {
        let r = ScoringValidation
            .call(&params(json!({"scores": [1, 2, 3, 4, 5]})), &ctx())
            .unwrap();
        assert_eq!(r.get_f64("n_dimensions"), Some(1.0));
        assert_eq!(r.get_bool("overall_valid"), Some(true));
    }

    #[test]
    fn test_dimensional_statistics_uneven_lengths() {
        let r = DimensionalStatistics
            .call(&params(json!({"data": {"a": [1, 2, 3, 4], "b": [2, 2], "c": []}})), &ctx())
            .unwrap();
        let dims = r.get("dimensions").unwrap();
        assert_eq!(dims["a"]["n"], json!(4));
        assert_eq!(dims["b"]["skew"], JsonValue::Null);
        assert_eq!(dims["c"]["valid"], json!(false));
        assert_eq!(r.get_f64("n_dimensions"), Some(3.0));
    }

    #[test]
    fn test_framework_coherence() {
        let rows = json!([[4, 4, 3], [3, 3, 3], [5, 4, 5], [2, 2, 3], [4, 5, 4]]);
        let r = FrameworkCoherence.call(&params(json!({ "scores": rows })), &ctx()).unwrap();
        assert!(r.get_f64("avg_inter_dimension_correlation").unwrap() > 0.5);
        let alpha = r.get_f64("cronbach_alpha").unwrap();
        assert_eq!(r.get_str("coherence_level"), Some(coherence_level(alpha)));
        let err = FrameworkCoherence
            .call(&params(json!({"scores": [1, 2, 3]})), &ctx())
            .unwrap_err();
        assert!(err.is(codes::INAPPLICABLE_INPUT));
    }

    #[test]
    fn test_multivariate_validation_blocks() {
        let r = MultivariateValidation
            .call(&params(json!({ "data": dimensions() })), &ctx())
            .unwrap();
        assert!(r.get("kmo").unwrap()["per_variable"].get("depth").is_some());
        assert!(r.get("bartlett_sphericity").unwrap()["chi_square"].as_f64().unwrap() > 0.0);
        let high = r.get("multicollinearity").unwrap()["high_correlations"].as_array().unwrap().clone();
        assert!(high.iter().any(|h| h["var1"] == json!("clarity") && h["var2"] == json!("depth")));
    }

    #[test]
    fn test_multivariate_validation_without_factor_backend() {
        let ctx = CallContext::new().with_capabilities(Capabilities::all().without(Capability::Factor));
        let r = MultivariateValidation
            .call(&params(json!({ "data": dimensions() })), &ctx)
            .unwrap();
        assert!(r.get("kmo").is_none());
        assert!(r.get("correlation_summary").is_some());
    }
}
