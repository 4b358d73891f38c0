//! Dataset loaders.
//!
//! A loader turns a dataset name into a fully materialized table. The HTTP
//! layer calls it once per request and never caches the result.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

use crate::error::LoadError;
use crate::record::{Record, Scalar};

/// Source of per-domain tables.
#[async_trait]
pub trait DatasetLoader: Send + Sync {
    /// Load every row of `dataset`, in stable file order.
    async fn load(&self, dataset: &str) -> Result<Vec<Record>, LoadError>;
}

/// Reads `<data_dir>/<dataset>.parquet` on every call.
#[derive(Debug, Clone)]
pub struct ParquetLoader {
    data_dir: PathBuf,
}

impl ParquetLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, dataset: &str) -> PathBuf {
        self.data_dir.join(format!("{dataset}.parquet"))
    }
}

#[async_trait]
impl DatasetLoader for ParquetLoader {
    async fn load(&self, dataset: &str) -> Result<Vec<Record>, LoadError> {
        let path = self.path_for(dataset);
        let name = dataset.to_string();

        let rows = tokio::task::spawn_blocking(move || read_parquet(&name, &path))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))??;

        tracing::debug!(dataset, rows = rows.len(), "dataset loaded");
        Ok(rows)
    }
}

/// Decode a Parquet file row by row.
pub fn read_parquet(dataset: &str, path: &Path) -> Result<Vec<Record>, LoadError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound {
            dataset: dataset.to_string(),
        },
        _ => LoadError::Io {
            dataset: dataset.to_string(),
            source,
        },
    })?;

    let parquet_err = |source| LoadError::Parquet {
        dataset: dataset.to_string(),
        source,
    };

    let reader = SerializedFileReader::new(file).map_err(parquet_err)?;
    let capacity = reader.metadata().file_metadata().num_rows().max(0) as usize;
    let iter = reader.get_row_iter(None).map_err(parquet_err)?;

    let mut rows = Vec::with_capacity(capacity);
    for row in iter {
        let row = row.map_err(parquet_err)?;
        let record: Record = row
            .get_column_iter()
            .map(|(name, field)| (name.clone(), field_to_scalar(field)))
            .collect();
        rows.push(record);
    }
    Ok(rows)
}

fn field_to_scalar(field: &Field) -> Scalar {
    match field {
        Field::Null => Scalar::Null,
        Field::Bool(v) => Scalar::Bool(*v),
        Field::Byte(v) => Scalar::Int(*v as i64),
        Field::Short(v) => Scalar::Int(*v as i64),
        Field::Int(v) => Scalar::Int(*v as i64),
        Field::Long(v) => Scalar::Int(*v),
        Field::UByte(v) => Scalar::Int(*v as i64),
        Field::UShort(v) => Scalar::Int(*v as i64),
        Field::UInt(v) => Scalar::Int(*v as i64),
        Field::ULong(v) => i64::try_from(*v)
            .map(Scalar::Int)
            .unwrap_or(Scalar::float(*v as f64)),
        Field::Float(v) => Scalar::float(*v as f64),
        Field::Double(v) => Scalar::float(*v),
        Field::Str(v) => Scalar::Str(v.clone()),
        Field::Date(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(Duration::days(*days as i64)))
            .map(|d| Scalar::Str(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Scalar::Null),
        // Timestamps, decimals, binary and nested values use the reader's text form
        other => Scalar::Str(other.to_string()),
    }
}

/// Tables held in memory, keyed by dataset name.
///
/// Used by tests and by embedders that already have the rows at hand.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, dataset: impl Into<String>, rows: Vec<Record>) -> Self {
        self.insert(dataset, rows);
        self
    }

    /// Replace a dataset's rows. Later requests observe the new rows.
    pub fn insert(&self, dataset: impl Into<String>, rows: Vec<Record>) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(dataset.into(), rows);
        }
    }

    pub fn remove(&self, dataset: &str) {
        if let Ok(mut tables) = self.tables.write() {
            tables.remove(dataset);
        }
    }
}

#[async_trait]
impl DatasetLoader for MemoryLoader {
    async fn load(&self, dataset: &str) -> Result<Vec<Record>, LoadError> {
        let tables = self
            .tables
            .read()
            .map_err(|e| LoadError::Task(e.to_string()))?;
        tables
            .get(dataset)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                dataset: dataset.to_string(),
            })
    }
}
