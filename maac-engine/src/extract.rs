//! Dimensional extractor
//!
//! Pulls the MAAC score fields out of loosely-typed experiment records. Each
//! (record, field) pair is coerced on its own: a bad value in one field never
//! costs the record its other fields.

use maac_core::{coerce_f64, float_json, NumericSeries, StatError};
use serde_json::{Map, Value as JsonValue};

/// Field holding the overall score; seeds the primary series
pub const OVERALL_SCORE: &str = "maac_overall_score";

/// The nine scored MAAC dimensions, in report order
pub const DIMENSIONS: [&str; 9] = [
    "maac_cognitive_load",
    "maac_tool_execution",
    "maac_content_quality",
    "maac_memory_integration",
    "maac_complexity_handling",
    "maac_hallucination_control",
    "maac_knowledge_transfer",
    "maac_processing_efficiency",
    "maac_construct_validity",
];

/// Per-dimension numeric series for one analysis run.
///
/// Built once from the request's records and not modified afterwards.
#[derive(Debug, Clone)]
pub struct DimensionalDataset {
    dimensions: Vec<(&'static str, NumericSeries)>,
    primary: NumericSeries,
    records: usize,
    complete: usize,
}

impl DimensionalDataset {
    /// Extract every catalogued field from `records`.
    ///
    /// A record that is not a JSON object makes the whole request malformed.
    pub fn extract(records: &[JsonValue]) -> Result<Self, StatError> {
        let mut dimensions: Vec<(&'static str, NumericSeries)> =
            DIMENSIONS.iter().map(|&d| (d, NumericSeries::new())).collect();
        let mut primary = NumericSeries::new();
        let mut complete = 0;

        for (i, record) in records.iter().enumerate() {
            let fields = record.as_object().ok_or_else(|| {
                StatError::malformed(format!("experiment record {} is not an object", i))
            })?;

            let mut all_present = true;
            for (name, series) in dimensions.iter_mut() {
                all_present &= take(fields, *name, series);
            }
            all_present &= take(fields, OVERALL_SCORE, &mut primary);

            if all_present {
                complete += 1;
            }
        }

        Ok(Self {
            dimensions,
            primary,
            records: records.len(),
            complete,
        })
    }

    /// The overall-score series
    pub fn primary(&self) -> &NumericSeries {
        &self.primary
    }

    /// Series for one dimension, `None` for names outside the catalogue
    pub fn dimension(&self, name: &str) -> Option<&NumericSeries> {
        self.dimensions.iter().find(|(d, _)| *d == name).map(|(_, s)| s)
    }

    /// Dimensions with at least one value, in catalogue order
    pub fn populated(&self) -> Vec<(&'static str, &NumericSeries)> {
        self.dimensions
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(d, s)| (*d, s))
            .collect()
    }

    /// Shortest length among the populated dimensions (0 when none are)
    pub fn common_len(&self) -> usize {
        self.populated().iter().map(|(_, s)| s.len()).min().unwrap_or(0)
    }

    /// Populated dimensions truncated to their common length, as a
    /// `{name: [values]}` object ready to pass as a table parameter
    pub fn common_table(&self) -> JsonValue {
        let n = self.common_len();
        let columns: Map<String, JsonValue> = self
            .populated()
            .into_iter()
            .map(|(d, s)| (d.to_string(), series_json(&s.truncated(n))))
            .collect();
        JsonValue::Object(columns)
    }

    pub fn n_records(&self) -> usize {
        self.records
    }

    /// Share of records where every catalogued field (the nine dimensions
    /// and the overall score) coerced to a finite number
    pub fn completeness(&self) -> f64 {
        if self.records == 0 {
            0.0
        } else {
            self.complete as f64 / self.records as f64
        }
    }
}

/// Coerce `fields[name]` into `series`; true when a finite value was stored
fn take(fields: &Map<String, JsonValue>, name: &str, series: &mut NumericSeries) -> bool {
    match fields.get(name).and_then(coerce_f64) {
        Some(x) => series.push(x),
        None => false,
    }
}

/// Floats as a JSON array
pub fn series_json(values: &[f64]) -> JsonValue {
    JsonValue::Array(values.iter().map(|&x| float_json(x)).collect())
}

// ============ Group partition ============

/// Overall scores partitioned by a categorical label.
///
/// Groups appear in first-occurrence order of their label in the record
/// sequence. Records without a label (missing, null, empty string, false)
/// belong to no group; a labelled record without a usable score still
/// establishes its group.
#[derive(Debug, Clone, Default)]
pub struct GroupPartition {
    groups: Vec<(String, NumericSeries)>,
}

impl GroupPartition {
    pub fn from_records(records: &[JsonValue], field: &str) -> Self {
        let mut groups: Vec<(String, NumericSeries)> = Vec::new();
        for record in records {
            let Some(label) = record.get(field).and_then(label_of) else {
                continue;
            };
            let pos = match groups.iter().position(|(l, _)| *l == label) {
                Some(pos) => pos,
                None => {
                    groups.push((label, NumericSeries::new()));
                    groups.len() - 1
                }
            };
            if let Some(x) = record.get(OVERALL_SCORE).and_then(coerce_f64) {
                groups[pos].1.push(x);
            }
        }
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.groups.iter().map(|(l, _)| l.as_str()).collect()
    }

    /// The first two groups, when both have at least `min_each` scores
    pub fn first_pair(&self, min_each: usize) -> Option<(&(String, NumericSeries), &(String, NumericSeries))> {
        match self.groups.as_slice() {
            [a, b, ..] if a.1.len() >= min_each && b.1.len() >= min_each => Some((a, b)),
            _ => None,
        }
    }
}

fn label_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_record(score: f64, tier: &str) -> JsonValue {
        let mut record = Map::new();
        for (i, d) in DIMENSIONS.iter().enumerate() {
            record.insert(d.to_string(), json!(score + i as f64 * 0.1));
        }
        record.insert(OVERALL_SCORE.into(), json!(score));
        record.insert("tier".into(), json!(tier));
        JsonValue::Object(record)
    }

    #[test]
    fn test_extract_full_records() {
        let records: Vec<JsonValue> = (0..4).map(|i| full_record(3.0 + i as f64 * 0.2, "basic")).collect();
        let ds = DimensionalDataset::extract(&records).unwrap();
        assert_eq!(ds.primary().len(), 4);
        assert_eq!(ds.populated().len(), 9);
        assert_eq!(ds.completeness(), 1.0);
        assert_eq!(ds.n_records(), 4);
    }

    #[test]
    fn test_bad_field_only_skips_that_field() {
        let records = vec![
            json!({"maac_overall_score": 4.0, "maac_cognitive_load": "high", "maac_tool_execution": "3.5"}),
            json!({"maac_overall_score": null, "maac_cognitive_load": 2.0}),
        ];
        let ds = DimensionalDataset::extract(&records).unwrap();
        assert_eq!(ds.primary().as_slice(), &[4.0]);
        assert_eq!(ds.dimension("maac_cognitive_load").unwrap().as_slice(), &[2.0]);
        assert_eq!(ds.dimension("maac_tool_execution").unwrap().as_slice(), &[3.5]);
        assert_eq!(ds.completeness(), 0.0);
    }

    #[test]
    fn test_completeness_is_all_or_nothing() {
        let mut partial = full_record(3.0, "a");
        partial.as_object_mut().unwrap().remove("maac_construct_validity");
        let records = vec![full_record(3.0, "a"), partial];
        let ds = DimensionalDataset::extract(&records).unwrap();
        assert_eq!(ds.completeness(), 0.5);
    }

    #[test]
    fn test_non_object_record_is_malformed() {
        let err = DimensionalDataset::extract(&[json!([1, 2, 3])]).unwrap_err();
        assert!(err.is(maac_core::codes::MALFORMED_REQUEST));
    }

    #[test]
    fn test_common_table_truncates() {
        let records = vec![
            json!({"maac_cognitive_load": 1, "maac_tool_execution": 2}),
            json!({"maac_cognitive_load": 3}),
        ];
        let ds = DimensionalDataset::extract(&records).unwrap();
        assert_eq!(ds.common_len(), 1);
        assert_eq!(
            ds.common_table(),
            json!({"maac_cognitive_load": [1.0], "maac_tool_execution": [2.0]})
        );
    }

    #[test]
    fn test_groups_in_first_occurrence_order() {
        let records = vec![
            full_record(3.0, "premium"),
            full_record(2.0, "basic"),
            full_record(3.5, "premium"),
            json!({"tier": "", "maac_overall_score": 1.0}),
            full_record(2.5, "basic"),
        ];
        let groups = GroupPartition::from_records(&records, "tier");
        assert_eq!(groups.labels(), vec!["premium", "basic"]);
        let (a, b) = groups.first_pair(2).unwrap();
        assert_eq!(a.1.as_slice(), &[3.0, 3.5]);
        assert_eq!(b.1.as_slice(), &[2.0, 2.5]);
    }

    #[test]
    fn test_first_pair_needs_enough_scores() {
        let records = vec![full_record(3.0, "a"), full_record(2.0, "b"), full_record(2.5, "b")];
        let groups = GroupPartition::from_records(&records, "tier");
        assert_eq!(groups.len(), 2);
        assert!(groups.first_pair(2).is_none());
    }
}
