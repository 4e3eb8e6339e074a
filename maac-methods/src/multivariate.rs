//! One-way MANOVA with Wilks' lambda, Pillai's trace and Rao's F

use crate::distributions::f_sf;
use crate::helpers::significant;
use maac_core::DataTable;
use maac_plugin::prelude::*;
use nalgebra::{DMatrix, DVector};
use serde::Deserialize;
use serde_json::Value as JsonValue;

static MANOVA_ARGS: [ArgMeta; 2] = [
    ArgMeta::required("data", "table", "Dependent variables as columns"),
    ArgMeta::required("groups", "list", "Group label per row"),
];

static MANOVA_RELATED: [&str; 2] = ["one_way_anova", "maac_multivariate_validation"];

#[derive(Deserialize)]
struct ManovaParams {
    data: DataTable,
    groups: Vec<JsonValue>,
}

fn label_key(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sums of squares and cross-products of `rows` around `center`
fn sscp(rows: &[DVector<f64>], center: &DVector<f64>) -> DMatrix<f64> {
    let p = center.len();
    rows.iter().fold(DMatrix::zeros(p, p), |acc, r| {
        let d = r - center;
        acc + &d * d.transpose()
    })
}

pub struct Manova;

impl MethodPlugin for Manova {
    fn meta(&self) -> MethodMeta {
        MethodMeta {
            name: "manova",
            description: "One-way multivariate analysis of variance",
            usage: "manova(data, groups)",
            args: &MANOVA_ARGS,
            returns: "{wilks_lambda, pillai_trace, f_value, df1, df2, p_value, significant, n_groups}",
            family: Family::Multivariate,
            related: &MANOVA_RELATED,
        }
    }

    fn call(&self, params: &Params, _ctx: &CallContext) -> Result<MethodResult, StatError> {
        let p: ManovaParams = parse(params)?;
        let table = p.data;
        if table.n_rows() != p.groups.len() {
            return Err(StatError::invalid_params(format!(
                "groups has {} labels but data has {} complete rows",
                p.groups.len(),
                table.n_rows()
            )));
        }

        // Partition rows by label, first occurrence order
        let mut labels: Vec<String> = Vec::new();
        let mut members: Vec<Vec<DVector<f64>>> = Vec::new();
        for (i, g) in p.groups.iter().enumerate() {
            let key = label_key(g);
            let row = DVector::from_vec(table.row(i));
            match labels.iter().position(|l| *l == key) {
                Some(pos) => members[pos].push(row),
                None => {
                    labels.push(key);
                    members.push(vec![row]);
                }
            }
        }

        let k = labels.len();
        if k < 2 {
            return Err(StatError::inapplicable("manova() requires at least 2 groups"));
        }
        let n_dv = table.n_cols();
        let n = table.n_rows();
        if n < k + n_dv {
            return Err(StatError::too_few("manova", k + n_dv, n));
        }

        let all: Vec<DVector<f64>> = members.iter().flatten().cloned().collect();
        let grand = all.iter().fold(DVector::zeros(n_dv), |acc, r| acc + r) / n as f64;

        let mut within = DMatrix::zeros(n_dv, n_dv);
        let mut between = DMatrix::zeros(n_dv, n_dv);
        for rows in &members {
            let m = rows.iter().fold(DVector::zeros(n_dv), |acc, r| acc + r) / rows.len() as f64;
            within += sscp(rows, &m);
            let d = &m - &grand;
            between += (&d * d.transpose()) * rows.len() as f64;
        }
        let total = &within + &between;

        let det_w = within.determinant();
        let det_t = total.determinant();
        if det_w.abs() < 1e-12 || det_t.abs() < 1e-12 {
            return Err(StatError::degenerate("Within-group SSCP matrix is singular"));
        }
        let wilks = det_w / det_t;
        let total_inv = total
            .try_inverse()
            .ok_or_else(|| StatError::degenerate("Total SSCP matrix is singular"))?;
        let pillai = (&between * total_inv).trace();

        // Rao's F approximation to Wilks' lambda
        let pf = n_dv as f64;
        let df_h = (k - 1) as f64;
        let df_e = (n - k) as f64;
        let denom = pf * pf + df_h * df_h - 5.0;
        let t = if denom > 0.0 {
            ((pf * pf * df_h * df_h - 4.0) / denom).sqrt()
        } else {
            1.0
        };
        let w = df_e + df_h - (pf + df_h + 1.0) / 2.0;
        let df1 = pf * df_h;
        let df2 = w * t - (pf * df_h - 2.0) / 2.0;
        let root = wilks.powf(1.0 / t);
        let f = (1.0 - root) / root * df2 / df1;
        let pv = f_sf(f, df1, df2);

        Ok(MethodResult::ok()
            .with("wilks_lambda", wilks)
            .with("pillai_trace", pillai)
            .with("f_value", f)
            .with("df1", df1)
            .with("df2", df2)
            .with("p_value", pv)
            .with("significant", significant(pv))
            .with("n_groups", k)
            .with("group_labels", labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::testing::params;
    use serde_json::json;

    fn ctx() -> CallContext {
        CallContext::new()
    }

    #[test]
    fn test_manova_separated_groups() {
        let r = Manova
            .call(
                &params(json!({
                    "data": {
                        "x": [1, 2, 3, 2, 1, 8, 9, 10, 9, 8],
                        "y": [2, 1, 2, 3, 2, 7, 9, 8, 8, 9]
                    },
                    "groups": ["a", "a", "a", "a", "a", "b", "b", "b", "b", "b"]
                })),
                &ctx(),
            )
            .unwrap();
        let wilks = r.get_f64("wilks_lambda").unwrap();
        let pillai = r.get_f64("pillai_trace").unwrap();
        assert!(wilks > 0.0 && wilks < 0.2);
        assert!(pillai > 0.8 && pillai <= 1.0);
        assert_eq!(r.get_bool("significant"), Some(true));
        assert_eq!(r.get_f64("n_groups"), Some(2.0));
    }

    #[test]
    fn test_manova_label_mismatch() {
        let err = Manova
            .call(
                &params(json!({"data": {"x": [1, 2, 3], "y": [3, 1, 2]}, "groups": [1, 2]})),
                &ctx(),
            )
            .unwrap_err();
        assert!(err.is(codes::INVALID_PARAMS));
    }

    #[test]
    fn test_manova_single_group() {
        let err = Manova
            .call(
                &params(json!({"data": {"x": [1, 2, 3, 4], "y": [3, 1, 2, 5]}, "groups": [1, 1, 1, 1]})),
                &ctx(),
            )
            .unwrap_err();
        assert!(err.is(codes::INAPPLICABLE_INPUT));
    }
}
