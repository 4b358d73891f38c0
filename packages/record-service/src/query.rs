//! Query validation and evaluation.
//!
//! A listing request is parsed into a [`ListQuery`]: typed exact-match
//! filters plus an offset/limit window. Out-of-range pagination and
//! unparseable filter values are rejected, never clamped.

use std::collections::HashMap;

use crate::catalog::{DomainSpec, FieldKind, KeySpec, LookupShape};
use crate::error::{Result, ServiceError};
use crate::record::{Lookup, PageResult, Record, Scalar};

pub const DEFAULT_LIMIT: usize = 100;
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 1000;

/// Validated listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// (column, required value) pairs, ANDed together
    pub filters: Vec<(String, Scalar)>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ListQuery {
    /// Parse raw query-string parameters against a domain's filter set.
    ///
    /// Unknown parameters are ignored. An empty filter value counts as absent.
    pub fn from_params(domain: &DomainSpec, params: &HashMap<String, String>) -> Result<Self> {
        let limit = match params.get("limit") {
            Some(raw) => parse_int("limit", raw)?,
            None => DEFAULT_LIMIT as i64,
        };
        if limit < MIN_LIMIT as i64 || limit > MAX_LIMIT as i64 {
            return Err(ServiceError::InvalidRequest(format!(
                "limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"
            )));
        }

        let offset = match params.get("offset") {
            Some(raw) => parse_int("offset", raw)?,
            None => 0,
        };
        if offset < 0 {
            return Err(ServiceError::InvalidRequest(format!(
                "offset must be greater than or equal to 0, got {offset}"
            )));
        }

        let mut filters = Vec::new();
        for filter in domain.filters {
            let Some(raw) = params.get(filter.param) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            filters.push((filter.column.to_string(), parse_value(filter.param, raw, filter.kind)?));
        }

        Ok(Self {
            filters,
            limit: limit as usize,
            offset: offset as usize,
        })
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|(column, wanted)| {
            record
                .get(column)
                .map(|value| value.matches(wanted))
                .unwrap_or(false)
        })
    }

    /// Filter, count and slice a freshly loaded table.
    pub fn apply(&self, table: Vec<Record>) -> PageResult {
        let matching: Vec<Record> = table.into_iter().filter(|r| self.matches(r)).collect();
        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect();

        PageResult {
            total,
            limit: self.limit,
            offset: self.offset,
            data,
        }
    }
}

/// A primary-key lookup whose key has already been parsed.
#[derive(Debug, Clone)]
pub struct KeyLookup {
    key: KeySpec,
    raw: String,
    wanted: Scalar,
}

impl KeyLookup {
    /// Parse `raw` as the key's declared type. Needs no dataset.
    pub fn parse(key: &KeySpec, raw: &str) -> Result<Self> {
        Ok(Self {
            key: *key,
            raw: raw.to_string(),
            wanted: parse_value(key.column, raw, key.kind)?,
        })
    }

    /// First match or all matches, per the key's lookup shape.
    pub fn apply(&self, table: Vec<Record>) -> Result<Lookup> {
        let key = &self.key;
        let mut matches = table.into_iter().filter(|r| {
            r.get(key.column)
                .map(|value| value.matches(&self.wanted))
                .unwrap_or(false)
        });

        let not_found = || ServiceError::RecordNotFound(key.missing_message(&self.raw));
        match key.shape {
            LookupShape::First => matches.next().map(Lookup::One).ok_or_else(not_found),
            LookupShape::All => {
                let all: Vec<Record> = matches.collect();
                if all.is_empty() {
                    Err(not_found())
                } else {
                    Ok(Lookup::Many(all))
                }
            }
        }
    }
}

/// Parse the key and search `table` in one go.
pub fn lookup(key: &KeySpec, raw: &str, table: Vec<Record>) -> Result<Lookup> {
    KeyLookup::parse(key, raw)?.apply(table)
}

fn parse_int(name: &str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        ServiceError::InvalidRequest(format!("{name} must be an integer, got {raw:?}"))
    })
}

fn parse_value(name: &str, raw: &str, kind: FieldKind) -> Result<Scalar> {
    match kind {
        FieldKind::Int => parse_int(name, raw).map(Scalar::Int),
        FieldKind::Str => Ok(Scalar::Str(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ATTENDANCE, GRADEBOOK, ISAT};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn attendance_row(id: i64, course: &str) -> Record {
        let mut r = Record::new();
        r.insert("student_id".into(), Scalar::Int(id));
        r.insert("course_id".into(), Scalar::from(course));
        r
    }

    fn table(n: i64) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let course = if i % 2 == 0 { "BUZZ-MATH-7" } else { "BUZZ-ELA-7" };
                attendance_row(1001 + i, course)
            })
            .collect()
    }

    #[test]
    fn defaults_apply_when_absent() {
        let q = ListQuery::from_params(&ATTENDANCE, &params(&[])).unwrap();
        assert_eq!(q, ListQuery::default());
    }

    #[test]
    fn limit_bounds_are_rejected_not_clamped() {
        for bad in ["0", "1001", "-5"] {
            let err = ListQuery::from_params(&ATTENDANCE, &params(&[("limit", bad)])).unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest(_)), "limit={bad}");
        }
        assert!(ListQuery::from_params(&ATTENDANCE, &params(&[("limit", "1")])).is_ok());
        assert!(ListQuery::from_params(&ATTENDANCE, &params(&[("limit", "1000")])).is_ok());
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err = ListQuery::from_params(&ATTENDANCE, &params(&[("offset", "-1")])).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[test]
    fn non_numeric_pagination_is_rejected() {
        assert!(ListQuery::from_params(&ATTENDANCE, &params(&[("limit", "ten")])).is_err());
        assert!(ListQuery::from_params(&ATTENDANCE, &params(&[("offset", "1.5")])).is_err());
    }

    #[test]
    fn typed_filters_are_parsed() {
        let q = ListQuery::from_params(
            &GRADEBOOK,
            &params(&[("student_id", "1001"), ("teacher", "Ms. Baker"), ("unknown", "x")]),
        )
        .unwrap();
        assert_eq!(
            q.filters,
            vec![
                ("student_id".to_string(), Scalar::Int(1001)),
                ("teacher".to_string(), Scalar::from("Ms. Baker")),
            ]
        );

        let err = ListQuery::from_params(&GRADEBOOK, &params(&[("student_id", "abc")])).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[test]
    fn filter_param_maps_to_column() {
        let q = ListQuery::from_params(&ISAT, &params(&[("math_level", "Advanced")])).unwrap();
        assert_eq!(q.filters[0].0, "math_performance_level");
    }

    #[test]
    fn empty_filter_value_is_ignored() {
        let q = ListQuery::from_params(&ATTENDANCE, &params(&[("course_id", "")])).unwrap();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn total_ignores_window() {
        let q = ListQuery {
            filters: vec![("course_id".into(), Scalar::from("BUZZ-MATH-7"))],
            limit: 3,
            offset: 2,
        };
        let page = q.apply(table(10));
        assert_eq!(page.total, 5);
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.data[0]["student_id"], Scalar::Int(1005));
    }

    #[test]
    fn filters_are_anded() {
        let q = ListQuery {
            filters: vec![
                ("course_id".into(), Scalar::from("BUZZ-MATH-7")),
                ("student_id".into(), Scalar::Int(1003)),
            ],
            ..Default::default()
        };
        let page = q.apply(table(10));
        assert_eq!(page.total, 1);

        let q = ListQuery {
            filters: vec![
                ("course_id".into(), Scalar::from("BUZZ-ELA-7")),
                ("student_id".into(), Scalar::Int(1003)),
            ],
            ..Default::default()
        };
        assert_eq!(q.apply(table(10)).total, 0);
    }

    #[test]
    fn offset_past_end_yields_empty_page() {
        let q = ListQuery {
            offset: 50,
            ..Default::default()
        };
        let page = q.apply(table(10));
        assert_eq!(page.total, 10);
        assert!(page.data.is_empty());
        assert!(page.is_last());
    }

    #[test]
    fn windows_cover_every_record_once() {
        let rows = table(23);
        let mut seen = Vec::new();
        let mut offset = 0;
        loop {
            let q = ListQuery {
                limit: 5,
                offset,
                ..Default::default()
            };
            let page = q.apply(rows.clone());
            let short = page.is_last();
            seen.extend(page.data);
            if short {
                break;
            }
            offset += 5;
        }
        assert_eq!(seen, rows);
    }

    #[test]
    fn lookup_first_returns_single_record() {
        let key = ATTENDANCE.key.unwrap();
        let found = lookup(&key, "1003", table(5)).unwrap();
        assert_eq!(found, Lookup::One(attendance_row(1003, "BUZZ-MATH-7")));
    }

    #[test]
    fn lookup_all_returns_every_match() {
        let key = ISAT.key.unwrap();
        let mut rows = Vec::new();
        for score in [700, 720, 650] {
            let mut r = Record::new();
            r.insert("eduid".into(), Scalar::from(if score == 650 { "222FAKE22" } else { "111FAKE11" }));
            r.insert("math_scale_score".into(), Scalar::Int(score));
            rows.push(r);
        }
        let found = lookup(&key, "111FAKE11", rows).unwrap();
        assert_eq!(found.into_records().len(), 2);
    }

    #[test]
    fn lookup_missing_key_is_not_found() {
        let key = ATTENDANCE.key.unwrap();
        let err = lookup(&key, "9999", table(5)).unwrap_err();
        match err {
            ServiceError::RecordNotFound(msg) => assert_eq!(msg, "Student 9999 not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn lookup_with_malformed_integer_key_is_invalid() {
        let key = ATTENDANCE.key.unwrap();
        let err = lookup(&key, "abc", table(5)).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
}
