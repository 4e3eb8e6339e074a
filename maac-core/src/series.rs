//! Numeric containers
//!
//! `NumericSeries` is one variable of finite values. `DataTable` is a set of
//! equal-length named columns with incomplete rows removed.

use crate::number::parse_element;
use crate::NumericError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::ops::Deref;

// ============ NumericSeries ============

/// Ordered sequence of finite values for one variable.
///
/// Length counts valid values only; positions do not map back to source
/// records once values have been dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NumericSeries {
    values: Vec<f64>,
}

impl NumericSeries {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Build from raw floats, dropping NaN and infinities
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        Self {
            values: values.into_iter().filter(|x| x.is_finite()).collect(),
        }
    }

    /// Build from JSON elements. Nulls and non-finite values are dropped,
    /// non-numeric elements are an error.
    pub fn from_json(items: &[JsonValue]) -> Result<Self, NumericError> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            if let Some(x) = parse_element(item)? {
                values.push(x);
            }
        }
        Ok(Self { values })
    }

    /// Append a value; returns false (and stores nothing) when not finite
    pub fn push(&mut self, x: f64) -> bool {
        if x.is_finite() {
            self.values.push(x);
            true
        } else {
            false
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// First `n` values (or all of them when shorter)
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            values: self.values.iter().take(n).copied().collect(),
        }
    }
}

impl Deref for NumericSeries {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for NumericSeries {
    fn from(values: Vec<f64>) -> Self {
        Self::from_values(values)
    }
}

impl<'de> Deserialize<'de> for NumericSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        let parsed = match &raw {
            JsonValue::Array(items) => Self::from_json(items),
            scalar => Self::from_json(std::slice::from_ref(scalar)),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

// ============ DataTable ============

/// Equal-length named numeric columns, stored column-major.
///
/// Rows containing any missing or non-finite cell are removed on
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTable {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
    #[serde(skip)]
    flat: bool,
}

impl DataTable {
    /// Build from an object of columns, a 2-D array of rows, or a flat array
    /// (one column).
    pub fn from_json(value: &JsonValue) -> Result<Self, NumericError> {
        match value {
            JsonValue::Object(map) => {
                let mut columns = Vec::with_capacity(map.len());
                for (name, column) in map {
                    let items = column.as_array().ok_or_else(|| {
                        NumericError::NonNumeric(format!("column '{}' is not an array", name))
                    })?;
                    let cells = items.iter().map(parse_element).collect::<Result<Vec<_>, _>>()?;
                    columns.push((name.clone(), cells));
                }
                Self::from_cells(columns, false)
            }
            JsonValue::Array(items) if items.iter().all(JsonValue::is_array) && !items.is_empty() => {
                let rows: Vec<Vec<Option<f64>>> = items
                    .iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(parse_element).collect())
                            .unwrap_or_else(|| Ok(Vec::new()))
                    })
                    .collect::<Result<_, _>>()?;
                let width = rows[0].len();
                let mut columns: Vec<(String, Vec<Option<f64>>)> =
                    (0..width).map(|j| (format!("var_{}", j), Vec::with_capacity(rows.len()))).collect();
                for (i, row) in rows.iter().enumerate() {
                    if row.len() != width {
                        return Err(NumericError::Ragged {
                            column: format!("row {}", i),
                            expected: width,
                            got: row.len(),
                        });
                    }
                    for (j, cell) in row.iter().enumerate() {
                        columns[j].1.push(*cell);
                    }
                }
                Self::from_cells(columns, false)
            }
            JsonValue::Array(items) => {
                let cells = items.iter().map(parse_element).collect::<Result<Vec<_>, _>>()?;
                Self::from_cells(vec![("var_0".to_string(), cells)], true)
            }
            other => Err(NumericError::NonNumeric(format!(
                "expected table (object of columns or 2-D array), got {}",
                other
            ))),
        }
    }

    fn from_cells(columns: Vec<(String, Vec<Option<f64>>)>, flat: bool) -> Result<Self, NumericError> {
        let expected = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        for (name, cells) in &columns {
            if cells.len() != expected {
                return Err(NumericError::Ragged {
                    column: name.clone(),
                    expected,
                    got: cells.len(),
                });
            }
        }

        let complete: Vec<usize> = (0..expected)
            .filter(|&i| columns.iter().all(|(_, cells)| cells[i].is_some()))
            .collect();

        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());
        for (name, cells) in columns {
            data.push(complete.iter().filter_map(|&i| cells[i]).collect());
            names.push(name);
        }

        Ok(Self { columns: names, data, flat })
    }

    pub fn n_rows(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, j: usize) -> &[f64] {
        &self.data[j]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|j| self.data[j].as_slice())
    }

    /// Iterate over columns as (name, values)
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .zip(self.data.iter())
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.data.iter().map(|col| col[i]).collect()
    }

    /// Per-row sums across all columns
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows())
            .map(|i| self.data.iter().map(|col| col[i]).sum())
            .collect()
    }

    /// True when built from a 1-D array
    pub fn is_flat(&self) -> bool {
        self.flat
    }
}

impl<'de> Deserialize<'de> for DataTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = JsonValue::deserialize(deserializer)?;
        Self::from_json(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_series_drops_nulls_and_non_finite() {
        let s: NumericSeries = serde_json::from_value(json!([1, null, "2", 3.5])).unwrap();
        assert_eq!(s.as_slice(), &[1.0, 2.0, 3.5]);

        let s = NumericSeries::from_values(vec![1.0, f64::NAN, f64::INFINITY, 2.0]);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_series_truncated() {
        let s = NumericSeries::from_values(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.truncated(2).as_slice(), &[1.0, 2.0]);
        assert_eq!(s.truncated(10), s);
    }

    #[test]
    fn test_series_rejects_text() {
        let r: Result<NumericSeries, _> = serde_json::from_value(json!([1, "abc"]));
        assert!(r.is_err());
    }

    #[test]
    fn test_table_from_object_keeps_column_order() {
        let t = DataTable::from_json(&json!({"b": [1, 2, 3], "a": [4, 5, 6]})).unwrap();
        assert_eq!(t.columns(), &["b".to_string(), "a".to_string()]);
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.column_by_name("a"), Some(&[4.0, 5.0, 6.0][..]));
    }

    #[test]
    fn test_table_drops_incomplete_rows() {
        let t = DataTable::from_json(&json!({"a": [1, null, 3], "b": [4, 5, 6]})).unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.row(1), vec![3.0, 6.0]);
    }

    #[test]
    fn test_table_ragged_columns_error() {
        let r = DataTable::from_json(&json!({"a": [1, 2, 3], "b": [4, 5]}));
        assert!(matches!(r, Err(NumericError::Ragged { .. })));
    }

    #[test]
    fn test_table_from_rows_and_flat() {
        let t = DataTable::from_json(&json!([[1, 2], [3, 4], [5, 6]])).unwrap();
        assert_eq!(t.n_cols(), 2);
        assert_eq!(t.columns()[1], "var_1");
        assert_eq!(t.column(1), &[2.0, 4.0, 6.0]);
        assert!(!t.is_flat());

        let flat = DataTable::from_json(&json!([1, 2, 3])).unwrap();
        assert!(flat.is_flat());
        assert_eq!(flat.n_cols(), 1);
    }
}
