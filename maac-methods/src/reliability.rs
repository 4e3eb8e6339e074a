//! Reliability: Cronbach's alpha, split-half, corrected item-total correlation

use crate::helpers::{self, TableParams};
use maac_core::DataTable;
use maac_plugin::prelude::*;
use serde_json::Map;

static TABLE_ARGS: [ArgMeta; 2] = [
    ArgMeta::optional("data", "table", "Items as columns, subjects as rows", "null"),
    ArgMeta::optional("X", "table", "Used when data is absent", "null"),
];

static RELIABILITY_RELATED: [&str; 3] = ["cronbach_alpha", "split_half", "item_total_corr"];

/// Internal-consistency grade for an alpha value
pub fn alpha_grade(alpha: f64) -> &'static str {
    if alpha < 0.5 {
        "unacceptable"
    } else if alpha < 0.6 {
        "poor"
    } else if alpha < 0.7 {
        "questionable"
    } else if alpha < 0.8 {
        "acceptable"
    } else if alpha < 0.9 {
        "good"
    } else {
        "excellent"
    }
}

/// Cronbach's alpha over the columns of `table`
pub(crate) fn cronbach(table: &DataTable) -> Result<f64, StatError> {
    let k = table.n_cols();
    if k < 2 || table.n_rows() < 2 {
        return Err(StatError::inapplicable("Need at least 2 items and 2 subjects"));
    }
    let item_var: f64 = table
        .iter_columns()
        .map(|(_, col)| helpers::variance(col, 1.0))
        .sum();
    let total_var = helpers::variance(&table.row_sums(), 1.0);
    if total_var == 0.0 {
        return Err(StatError::degenerate("Total variance is zero"));
    }
    let kf = k as f64;
    Ok(kf / (kf - 1.0) * (1.0 - item_var / total_var))
}

// ============ Cronbach's alpha ============

pub struct CronbachAlpha;

impl MethodPlugin for CronbachAlpha {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "cronbach_alpha",
            description: "Cronbach's alpha internal consistency",
            usage: "cronbach_alpha(data)",
            args: &TABLE_ARGS,
            returns: "{alpha, interpretation, n_items, n_subjects}",
            family: Family::Reliability,
            related: &RELIABILITY_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let table = parse::<TableParams>(params)?.resolve()?;
        let alpha = cronbach(&table)?;
        Ok(MethodResult::ok()
            .with("alpha", alpha)
            .with("interpretation", alpha_grade(alpha))
            .with("n_items", table.n_cols())
            .with("n_subjects", table.n_rows()))
    }
}

// ============ Split-half ============

pub struct SplitHalf;

impl MethodPlugin for SplitHalf {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "split_half",
            description: "Odd/even split-half reliability with Spearman-Brown correction",
            usage: "split_half(data)",
            args: &TABLE_ARGS,
            returns: "{split_half, uncorrected_r}",
            family: Family::Reliability,
            related: &RELIABILITY_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let table = parse::<TableParams>(params)?.resolve()?;
        if table.n_cols() < 2 {
            return Err(StatError::inapplicable("Need at least 2 items"));
        }
        helpers::require_len("split_half", table.n_rows(), 3)?;

        let half = |start: usize| -> Vec<f64> {
            (0..table.n_rows())
                .map(|i| (start..table.n_cols()).step_by(2).map(|j| table.column(j)[i]).sum())
                .collect()
        };
        let (odd, even) = (half(0), half(1));
        let r = helpers::pearson_r(&odd, &even)
            .ok_or_else(|| StatError::degenerate("Half scores have zero variance"))?;
        let corrected = 2.0 * r / (1.0 + r);
        Ok(MethodResult::ok()
            .with("split_half", corrected)
            .with("uncorrected_r", r))
    }
}

// ============ Item-total correlation ============

pub struct ItemTotalCorr;

impl MethodPlugin for ItemTotalCorr {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "item_total_corr",
            description: "Corrected item-total correlation (item against the sum of the others)",
            usage: "item_total_corr(X)",
            args: &TABLE_ARGS,
            returns: "{item_total_correlations, n_items}",
            family: Family::Reliability,
            related: &RELIABILITY_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let table = parse::<TableParams>(params)?.resolve()?;
        if table.n_cols() < 2 {
            return Err(StatError::inapplicable("Need at least 2 items"));
        }
        helpers::require_len("item_total_corr", table.n_rows(), 3)?;

        let total = table.row_sums();
        let mut out = Map::new();
        for (name, col) in table.iter_columns() {
            let rest: Vec<f64> = total.iter().zip(col).map(|(t, v)| t - v).collect();
            let r = helpers::pearson_r(col, &rest).unwrap_or(f64::NAN);
            out.insert(name.to_string(), maac_core::float_json(r));
        }
        Ok(MethodResult::ok()
            .with("item_total_correlations", out)
            .with("n_items", table.n_cols()))
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
    fn test_cronbach_parallel_items() {
        let r = CronbachAlpha
            .call(
                &params(json!({"data": {"a": [1, 2, 3, 4, 5], "b": [1, 2, 3, 4, 5], "c": [2, 3, 4, 5, 6]}})),
                &ctx(),
            )
            .unwrap();
        assert!(approx(r.get_f64("alpha").unwrap(), 1.0, 1e-12));
        assert_eq!(r.get_str("interpretation"), Some("excellent"));
        assert_eq!(r.get_f64("n_items"), Some(3.0));
        assert_eq!(r.get_f64("n_subjects"), Some(5.0));
    }

    #[test]
    fn test_cronbach_independent_noise_near_zero() {
        use rand::Rng;
        let mut rng = helpers::rng(Some(2024));
        let items: Map<String, serde_json::Value> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| {
                let col: Vec<f64> = (0..2000).map(|_| rng.gen::<f64>()).collect();
                (name.to_string(), json!(col))
            })
            .collect();
        let r = CronbachAlpha.call(&params(json!({ "data": items })), &ctx()).unwrap();
        let alpha = r.get_f64("alpha").unwrap();
        assert!(alpha.abs() < 0.15, "alpha {} on independent items", alpha);
        assert_eq!(r.get_str("interpretation"), Some("unacceptable"));
    }

    #[test]
    fn test_cronbach_accepts_x_rows() {
        let r = CronbachAlpha
            .call(&params(json!({"X": [[1, 2], [2, 3], [3, 5], [4, 4]]})), &ctx())
            .unwrap();
        assert!(r.get_f64("alpha").unwrap() > 0.5);
    }

    #[test]
    fn test_cronbach_needs_two_items() {
        let err = CronbachAlpha
            .call(&params(json!({"data": {"a": [1, 2, 3]}})), &ctx())
            .unwrap_err();
        assert!(err.is(codes::INAPPLICABLE_INPUT));
        let err = CronbachAlpha
            .call(&params(json!({"data": {"a": [2, 2, 2], "b": [3, 3, 3]}})), &ctx())
            .unwrap_err();
        assert!(err.is(codes::DEGENERATE_INPUT));
    }

    #[test]
    fn test_split_half_perfect() {
        let r = SplitHalf
            .call(
                &params(json!({"data": {"a": [1, 2, 3, 4], "b": [1, 2, 3, 4], "c": [2, 3, 4, 5], "d": [2, 3, 4, 5]}})),
                &ctx(),
            )
            .unwrap();
        assert!(approx(r.get_f64("uncorrected_r").unwrap(), 1.0, 1e-12));
        assert!(approx(r.get_f64("split_half").unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn test_item_total_corr_keys() {
        let r = ItemTotalCorr
            .call(
                &params(json!({"X": {"q1": [1, 2, 3, 4, 5], "q2": [2, 2, 3, 5, 5], "q3": [1, 3, 3, 4, 4]}})),
                &ctx(),
            )
            .unwrap();
        let corr = r.get("item_total_correlations").unwrap().as_object().unwrap();
        assert_eq!(corr.keys().collect::<Vec<_>>(), vec!["q1", "q2", "q3"]);
        assert!(corr["q1"].as_f64().unwrap() > 0.5);
    }
}
