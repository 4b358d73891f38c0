//! Synthetic seed data.
//!
//! Generates a cohort of fictional students and writes the three backing
//! datasets (attendance, gradebook, ISAT) as Parquet files. Attributes are
//! correlated: a student's base grade drives their assignment scores and
//! skews their assessment performance level.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use fastrand::Rng;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use crate::catalog::{ATTENDANCE, GRADEBOOK, ISAT};
use crate::error::SeedError;

pub const DEFAULT_STUDENTS: usize = 500;
pub const FIRST_STUDENT_ID: i64 = 1001;

const ASSIGNMENTS: usize = 40;
const TESTS: usize = 4;

const FIRST_NAMES: &[&str] = &[
    "Emma", "Liam", "Olivia", "Noah", "Ava", "Ethan", "Sophia", "Mason", "Isabella", "William",
    "Mia", "James", "Charlotte", "Benjamin", "Amelia", "Lucas", "Harper", "Henry", "Evelyn",
    "Alexander", "Abigail", "Michael", "Emily", "Daniel", "Elizabeth", "Jacob", "Sofia", "Logan",
    "Avery", "Jackson", "Ella", "Sebastian", "Scarlett", "Mateo", "Grace", "Jack", "Chloe", "Owen",
    "Victoria", "Theodore", "Riley", "Aiden", "Aria", "Samuel", "Lily", "Ryan", "Aurora", "John",
    "Zoey", "Luke", "Penelope", "Gabriel", "Layla", "Anthony", "Nora", "Dylan", "Camila", "Leo",
    "Hannah", "Lincoln", "Addison", "Jaxon", "Eleanor", "Asher", "Stella", "Christopher", "Bella",
    "Josiah", "Lucy", "Andrew", "Paisley", "Thomas", "Natalie", "David", "Skylar", "Joseph",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker", "Hall",
    "Rivera", "Campbell", "Mitchell", "Carter", "Roberts", "Chen", "Kim", "Patel", "Singh",
    "Kumar", "Shah",
];

const COURSES: &[&str] = &["BUZZ-MATH-7", "BUZZ-MATH-8", "BUZZ-ELA-7", "BUZZ-ELA-8", "BUZZ-SCI-7"];
const SECTIONS: &[&str] = &["SEC-01", "SEC-02", "SEC-03"];
const TEACHERS: &[&str] = &["Mr. Anderson", "Ms. Baker", "Mr. Chen", "Ms. Davis", "Mr. Edwards"];

/// Assessment performance bands, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceLevel {
    BelowBasic,
    Basic,
    Proficient,
    Advanced,
}

impl PerformanceLevel {
    const ALL: [PerformanceLevel; 4] = [
        PerformanceLevel::BelowBasic,
        PerformanceLevel::Basic,
        PerformanceLevel::Proficient,
        PerformanceLevel::Advanced,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceLevel::BelowBasic => "Below Basic",
            PerformanceLevel::Basic => "Basic",
            PerformanceLevel::Proficient => "Proficient",
            PerformanceLevel::Advanced => "Advanced",
        }
    }

    /// Inclusive scale-score range for the band.
    pub fn score_range(&self) -> (i64, i64) {
        match self {
            PerformanceLevel::BelowBasic => (600, 659),
            PerformanceLevel::Basic => (660, 719),
            PerformanceLevel::Proficient => (720, 769),
            PerformanceLevel::Advanced => (770, 800),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub student_id: i64,
    pub name: String,
    pub course: &'static str,
    pub section: &'static str,
    pub teacher: &'static str,
    pub base_grade: i64,
    pub absence_rate: f64,
    pub math_level: PerformanceLevel,
    pub ela_level: PerformanceLevel,
    pub eduid: String,
}

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub students: usize,
    /// Fixed RNG seed for reproducible output
    pub seed: Option<u64>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            students: DEFAULT_STUDENTS,
            seed: None,
        }
    }
}

/// Files written by [`write_seeds`].
#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub students: usize,
    pub files: Vec<PathBuf>,
}

/// School days covered by the attendance dataset.
pub fn attendance_days() -> Vec<NaiveDate> {
    let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(2026, 1, 5),
        NaiveDate::from_ymd_opt(2026, 3, 6),
    ) else {
        return Vec::new();
    };

    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| d.weekday().num_days_from_monday() < 5)
        .collect()
}

pub fn generate_students(count: usize, rng: &mut Rng) -> Vec<Student> {
    let mut used = HashSet::new();

    (0..count)
        .map(|i| {
            let base_grade = rng.i64(50..=95);
            let (math_weights, ela_weights) = if base_grade >= 85 {
                ([5, 15, 30, 50], [10, 20, 35, 35])
            } else if base_grade >= 70 {
                ([15, 30, 35, 20], [15, 30, 35, 20])
            } else if base_grade >= 55 {
                ([25, 40, 25, 10], [25, 40, 25, 10])
            } else {
                ([40, 35, 20, 5], [40, 35, 20, 5])
            };

            Student {
                student_id: FIRST_STUDENT_ID + i as i64,
                name: unique_name(rng, &mut used),
                course: pick(rng, COURSES),
                section: pick(rng, SECTIONS),
                teacher: pick(rng, TEACHERS),
                base_grade,
                absence_rate: 0.05 + rng.f64() * 0.20,
                math_level: PerformanceLevel::ALL[weighted(rng, &math_weights)],
                ela_level: PerformanceLevel::ALL[weighted(rng, &ela_weights)],
                eduid: format!("{}FAKE{}", rng.u32(100..=999), rng.u32(10..=99)),
            }
        })
        .collect()
}

/// One row per student, one status column per school day ("Absent" or "").
pub fn attendance_batch(students: &[Student], rng: &mut Rng) -> Result<RecordBatch, SeedError> {
    let days = attendance_days();
    let mut fields = roster_fields(false);
    let mut columns = roster_columns(students, false);

    for day in &days {
        let mut b = StringBuilder::with_capacity(students.len(), students.len() * 6);
        for s in students {
            b.append_value(if rng.f64() < s.absence_rate { "Absent" } else { "" });
        }
        fields.push(Field::new(day.format("%Y-%m-%d").to_string(), DataType::Utf8, false));
        columns.push(Arc::new(b.finish()));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Assignment and test scores (5% missing) plus the running course grade.
pub fn gradebook_batch(students: &[Student], rng: &mut Rng) -> Result<RecordBatch, SeedError> {
    let mut fields = roster_fields(true);
    let mut columns = roster_columns(students, true);

    let mut scores: Vec<Vec<Option<i64>>> = Vec::with_capacity(students.len());
    for s in students {
        let mut row: Vec<Option<i64>> = (0..ASSIGNMENTS)
            .map(|_| grade(rng, s.base_grade, 12))
            .collect();
        row.extend((0..TESTS).map(|_| grade(rng, s.base_grade, 10)));
        scores.push(row);
    }

    let names = (1..=ASSIGNMENTS)
        .map(|i| format!("assignment_{i}"))
        .chain((1..=TESTS).map(|i| format!("test_{i}")));
    for (col, name) in names.enumerate() {
        let mut b = Int64Builder::with_capacity(students.len());
        for row in &scores {
            b.append_option(row[col]);
        }
        fields.push(Field::new(name, DataType::Int64, true));
        columns.push(Arc::new(b.finish()));
    }

    let mut current = Float64Builder::with_capacity(students.len());
    for row in &scores {
        let graded: Vec<i64> = row.iter().flatten().copied().collect();
        if graded.is_empty() {
            current.append_null();
        } else {
            let mean = graded.iter().sum::<i64>() as f64 / graded.len() as f64;
            current.append_value((mean * 10.0).round() / 10.0);
        }
    }
    fields.push(Field::new("current_grade", DataType::Float64, true));
    columns.push(Arc::new(current.finish()));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// One assessment sitting per student, keyed by EDUID.
pub fn isat_batch(students: &[Student], rng: &mut Rng) -> Result<RecordBatch, SeedError> {
    let n = students.len();
    let mut eduid = StringBuilder::with_capacity(n, n * 9);
    let mut name = StringBuilder::with_capacity(n, n * 16);
    let mut course = StringBuilder::with_capacity(n, n * 11);
    let mut section = StringBuilder::with_capacity(n, n * 6);
    let mut math_score = Int64Builder::with_capacity(n);
    let mut math_level = StringBuilder::with_capacity(n, n * 11);
    let mut ela_score = Int64Builder::with_capacity(n);
    let mut ela_level = StringBuilder::with_capacity(n, n * 11);

    for s in students {
        eduid.append_value(&s.eduid);
        name.append_value(&s.name);
        course.append_value(s.course);
        section.append_value(s.section);
        math_score.append_value(scale_score(rng, s.math_level));
        math_level.append_value(s.math_level.label());
        ela_score.append_value(scale_score(rng, s.ela_level));
        ela_level.append_value(s.ela_level.label());
    }

    let schema = Schema::new(vec![
        Field::new("eduid", DataType::Utf8, false),
        Field::new("student_name", DataType::Utf8, false),
        Field::new("course_id", DataType::Utf8, false),
        Field::new("section_id", DataType::Utf8, false),
        Field::new("math_scale_score", DataType::Int64, false),
        Field::new("math_performance_level", DataType::Utf8, false),
        Field::new("ela_scale_score", DataType::Int64, false),
        Field::new("ela_performance_level", DataType::Utf8, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(eduid.finish()),
        Arc::new(name.finish()),
        Arc::new(course.finish()),
        Arc::new(section.finish()),
        Arc::new(math_score.finish()),
        Arc::new(math_level.finish()),
        Arc::new(ela_score.finish()),
        Arc::new(ela_level.finish()),
    ];

    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Write a single batch as a Parquet file.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<(), SeedError> {
    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Generate a cohort and write all three datasets into `dir`.
pub fn write_seeds(dir: &Path, options: &SeedOptions) -> Result<SeedSummary, SeedError> {
    fs::create_dir_all(dir)?;

    let mut rng = match options.seed {
        Some(seed) => Rng::with_seed(seed),
        None => Rng::new(),
    };
    let students = generate_students(options.students, &mut rng);

    let batches = [
        (ATTENDANCE.dataset, attendance_batch(&students, &mut rng)?),
        (GRADEBOOK.dataset, gradebook_batch(&students, &mut rng)?),
        (ISAT.dataset, isat_batch(&students, &mut rng)?),
    ];

    let mut files = Vec::with_capacity(batches.len());
    for (dataset, batch) in &batches {
        let path = dir.join(format!("{dataset}.parquet"));
        write_parquet(&path, batch)?;
        tracing::info!(path = %path.display(), rows = batch.num_rows(), "wrote seed file");
        files.push(path);
    }

    Ok(SeedSummary {
        students: students.len(),
        files,
    })
}

fn roster_fields(with_teacher: bool) -> Vec<Field> {
    let mut fields = vec![
        Field::new("student_id", DataType::Int64, false),
        Field::new("student_name", DataType::Utf8, false),
        Field::new("course_id", DataType::Utf8, false),
        Field::new("section_id", DataType::Utf8, false),
    ];
    if with_teacher {
        fields.push(Field::new("teacher", DataType::Utf8, false));
    }
    fields
}

fn roster_columns(students: &[Student], with_teacher: bool) -> Vec<ArrayRef> {
    let n = students.len();
    let mut id = Int64Builder::with_capacity(n);
    let mut name = StringBuilder::with_capacity(n, n * 16);
    let mut course = StringBuilder::with_capacity(n, n * 11);
    let mut section = StringBuilder::with_capacity(n, n * 6);
    let mut teacher = StringBuilder::with_capacity(n, n * 12);

    for s in students {
        id.append_value(s.student_id);
        name.append_value(&s.name);
        course.append_value(s.course);
        section.append_value(s.section);
        teacher.append_value(s.teacher);
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(id.finish()),
        Arc::new(name.finish()),
        Arc::new(course.finish()),
        Arc::new(section.finish()),
    ];
    if with_teacher {
        columns.push(Arc::new(teacher.finish()));
    }
    columns
}

fn pick(rng: &mut Rng, pool: &'static [&'static str]) -> &'static str {
    pool[rng.usize(..pool.len())]
}

fn weighted(rng: &mut Rng, weights: &[u32]) -> usize {
    let total: u32 = weights.iter().sum();
    let mut roll = rng.u32(..total);
    for (i, w) in weights.iter().enumerate() {
        if roll < *w {
            return i;
        }
        roll -= w;
    }
    weights.len() - 1
}

fn unique_name(rng: &mut Rng, used: &mut HashSet<String>) -> String {
    // Name pool has a few thousand combinations; past that, disambiguate
    for _ in 0..64 {
        let name = format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES));
        if used.insert(name.clone()) {
            return name;
        }
    }
    let name = format!(
        "{} {} {}",
        pick(rng, FIRST_NAMES),
        pick(rng, LAST_NAMES),
        used.len() + 1
    );
    used.insert(name.clone());
    name
}

fn grade(rng: &mut Rng, base: i64, variance: i64) -> Option<i64> {
    if rng.f64() < 0.05 {
        return None;
    }
    Some((base + rng.i64(-variance..=variance)).clamp(0, 100))
}

fn scale_score(rng: &mut Rng, level: PerformanceLevel) -> i64 {
    let (low, high) = level.score_range();
    rng.i64(low..=high)
}
