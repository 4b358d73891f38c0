//! Records and page payloads.
//!
//! These types are the wire format of the service and are shared with the
//! extraction pipeline, which deserializes the same shapes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// Serialized untagged, so a record looks like plain JSON:
/// `{"student_id": 1001, "student_name": "Emma Smith", "current_grade": null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Build a float cell, mapping NaN and infinities to `Null`.
    pub fn float(v: f64) -> Self {
        if v.is_finite() {
            Scalar::Float(v)
        } else {
            Scalar::Null
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Exact-match comparison used by query filters.
    ///
    /// Integers and floats compare numerically, since a nullable integer
    /// column can come back from the file as doubles. `Null` matches nothing.
    pub fn matches(&self, wanted: &Scalar) -> bool {
        match (self, wanted) {
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Int(b)) => *a == *b as f64,
            (Scalar::Int(a), Scalar::Float(b)) => *a as f64 == *b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b,
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// One row of a dataset: field name to value, in file column order.
pub type Record = IndexMap<String, Scalar>;

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Matching records ignoring offset/limit
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub data: Vec<Record>,
}

impl PageResult {
    /// A page shorter than its limit is the last one.
    pub fn is_last(&self) -> bool {
        self.data.len() < self.limit
    }
}

/// Response of a primary-key lookup.
///
/// Some domains return the first match, others every match for the key;
/// see [`crate::catalog::LookupShape`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lookup {
    Many(Vec<Record>),
    One(Record),
}

impl Lookup {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Lookup::One(record) => vec![record],
            Lookup::Many(records) => records,
        }
    }
}

/// Union of field names across records, in order of first appearance.
pub fn column_names(records: &[Record]) -> Vec<String> {
    let mut columns: IndexMap<&str, ()> = IndexMap::new();
    for record in records {
        for name in record.keys() {
            columns.entry(name.as_str()).or_insert(());
        }
    }
    columns.into_keys().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Scalar)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn integer_filter_matches_float_cell() {
        assert!(Scalar::Float(1001.0).matches(&Scalar::Int(1001)));
        assert!(!Scalar::Float(1001.5).matches(&Scalar::Int(1001)));
    }

    #[test]
    fn null_matches_nothing() {
        assert!(!Scalar::Null.matches(&Scalar::Null));
        assert!(!Scalar::Null.matches(&Scalar::Str(String::new())));
    }

    #[test]
    fn string_does_not_match_number() {
        assert!(!Scalar::Str("1001".into()).matches(&Scalar::Int(1001)));
    }

    #[test]
    fn nan_becomes_null() {
        assert_eq!(Scalar::float(f64::NAN), Scalar::Null);
        assert_eq!(Scalar::from(Some(2.5)), Scalar::Float(2.5));
        assert_eq!(Scalar::from(None::<i64>), Scalar::Null);
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let r = record(&[
            ("student_id", Scalar::Int(1001)),
            ("student_name", Scalar::from("Emma Smith")),
            ("current_grade", Scalar::Null),
        ]);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(
            json,
            r#"{"student_id":1001,"student_name":"Emma Smith","current_grade":null}"#
        );

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn lookup_deserializes_by_shape() {
        let one: Lookup = serde_json::from_str(r#"{"eduid":"123FAKE45"}"#).unwrap();
        assert!(matches!(one, Lookup::One(_)));

        let many: Lookup = serde_json::from_str(r#"[{"eduid":"123FAKE45"},{"eduid":"123FAKE45"}]"#).unwrap();
        assert_eq!(many.into_records().len(), 2);
    }

    #[test]
    fn column_names_keeps_first_appearance_order() {
        let rows = vec![
            record(&[("a", Scalar::Int(1)), ("b", Scalar::Int(2))]),
            record(&[("b", Scalar::Int(3)), ("c", Scalar::Int(4))]),
        ];
        assert_eq!(column_names(&rows), vec!["a", "b", "c"]);
    }
}
