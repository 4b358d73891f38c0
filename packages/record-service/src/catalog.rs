//! Domain catalogue.
//!
//! A [`DomainSpec`] names the REST resource, the backing dataset, the
//! exact-match filters it accepts and its primary-key lookup contract.
//! A [`System`] is a deployable service exposing a fixed set of domains.

use clap::ValueEnum;

/// Declared type of a filter or key, used to parse query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Str,
}

/// Query parameter `param` filters rows where `column` equals the value.
#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub param: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

/// What a primary-key lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupShape {
    /// The first matching record (one row per entity)
    First,
    /// Every matching record (an entity may have several rows)
    All,
}

#[derive(Debug, Clone, Copy)]
pub struct KeySpec {
    pub column: &'static str,
    pub kind: FieldKind,
    pub shape: LookupShape,
    /// Not-found message; `{key}` is replaced by the requested value
    pub missing: &'static str,
}

impl KeySpec {
    pub fn missing_message(&self, key: &str) -> String {
        self.missing.replace("{key}", key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DomainSpec {
    pub resource: &'static str,
    pub dataset: &'static str,
    pub filters: &'static [FilterSpec],
    pub key: Option<KeySpec>,
}

const fn filter(param: &'static str, column: &'static str, kind: FieldKind) -> FilterSpec {
    FilterSpec {
        param,
        column,
        kind,
    }
}

pub const ATTENDANCE: DomainSpec = DomainSpec {
    resource: "attendance",
    dataset: "attendance",
    filters: &[
        filter("student_id", "student_id", FieldKind::Int),
        filter("course_id", "course_id", FieldKind::Str),
    ],
    key: Some(KeySpec {
        column: "student_id",
        kind: FieldKind::Int,
        shape: LookupShape::First,
        missing: "Student {key} not found",
    }),
};

pub const GRADEBOOK: DomainSpec = DomainSpec {
    resource: "gradebook",
    dataset: "gradebook",
    filters: &[
        filter("student_id", "student_id", FieldKind::Int),
        filter("course_id", "course_id", FieldKind::Str),
        filter("teacher", "teacher", FieldKind::Str),
    ],
    key: Some(KeySpec {
        column: "student_id",
        kind: FieldKind::Int,
        shape: LookupShape::First,
        missing: "Student {key} not found",
    }),
};

pub const ISAT: DomainSpec = DomainSpec {
    resource: "isat",
    dataset: "isat_data",
    filters: &[
        filter("course_id", "course_id", FieldKind::Str),
        filter("math_level", "math_performance_level", FieldKind::Str),
        filter("ela_level", "ela_performance_level", FieldKind::Str),
    ],
    key: Some(KeySpec {
        column: "eduid",
        kind: FieldKind::Str,
        shape: LookupShape::All,
        missing: "Student with EDUID {key} not found",
    }),
};

/// Student roster view over the ISAT dataset (combined service only).
pub const STUDENTS: DomainSpec = DomainSpec {
    resource: "students",
    dataset: "isat_data",
    filters: &[
        filter("course_id", "course_id", FieldKind::Str),
        filter("section_id", "section_id", FieldKind::Str),
    ],
    key: None,
};

/// A deployable record service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum System {
    /// Combined education data API serving every domain
    Ieta,
    /// Student Information System: attendance
    Sis,
    /// Learning Management System: gradebook
    Lms,
    /// State Reporting: ISAT assessments
    State,
}

impl System {
    pub fn name(&self) -> &'static str {
        match self {
            System::Ieta => "IETA",
            System::Sis => "SIS",
            System::Lms => "LMS",
            System::State => "State Reporting",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            System::Ieta => 8000,
            System::Sis => 8001,
            System::Lms => 8002,
            System::State => 8003,
        }
    }

    pub fn domains(&self) -> &'static [&'static DomainSpec] {
        match self {
            System::Ieta => &[&STUDENTS, &ATTENDANCE, &GRADEBOOK, &ISAT],
            System::Sis => &[&ATTENDANCE],
            System::Lms => &[&GRADEBOOK],
            System::State => &[&ISAT],
        }
    }

    /// Paths advertised by the health endpoint.
    pub fn endpoints(&self) -> Vec<String> {
        self.domains()
            .iter()
            .map(|d| format!("/{}", d.resource))
            .collect()
    }
}
