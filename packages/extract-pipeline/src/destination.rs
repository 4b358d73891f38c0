//! Warehouse destination.
//!
//! Tables are written as full replacements: drop, create and bulk insert
//! inside one transaction, so readers see either the previous table or the
//! complete new one. Schemas map to SQLite attached databases, which keeps
//! names like `raw.attendance` valid in downstream SQL. An empty
//! replacement clears the rows of an existing table and keeps its columns.
//!
//! The store holds a single connection. Concurrent replacements are not
//! safe to interleave; callers serialize them (see
//! [`crate::dag::ResourceLocks`]).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use record_service::{column_names, Record, Scalar};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Connection, QueryBuilder, Row, Sqlite, TypeInfo, ValueRef};

use crate::error::DestinationError;

/// Upper bound on bind parameters per INSERT statement.
const MAX_BIND_PARAMS: usize = 30_000;

type Result<T> = std::result::Result<T, DestinationError>;

/// Target of a pipeline step's write.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Atomically replace `schema.table` with `rows`. Returns rows written.
    async fn replace_table(&self, table: &str, schema: &str, rows: &[Record]) -> Result<usize>;
}

#[derive(Debug, Clone)]
enum Location {
    Memory,
    File(PathBuf),
}

/// SQLite-backed warehouse.
pub struct SqliteDestination {
    pool: SqlitePool,
    location: Location,
}

impl SqliteDestination {
    /// Open (creating if needed) a file-backed warehouse.
    ///
    /// Schema `raw` of `warehouse.db` lives in `warehouse.raw.db` next to it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = pool_options().connect_with(options).await?;

        Ok(Self {
            pool,
            location: Location::File(path),
        })
    }

    /// Create an in-memory warehouse (for testing).
    pub async fn in_memory() -> Result<Self> {
        let pool = pool_options().connect("sqlite::memory:").await?;
        Ok(Self {
            pool,
            location: Location::Memory,
        })
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn table_exists(&self, table: &str, schema: &str) -> Result<bool> {
        validate_identifier(table)?;
        let mut conn = self.pool.acquire().await?;
        self.ensure_schema(&mut conn, schema).await?;
        exists_on(&mut conn, schema, table).await
    }

    pub async fn row_count(&self, table: &str, schema: &str) -> Result<i64> {
        let name = qualified(schema, table)?;
        let mut conn = self.pool.acquire().await?;
        self.ensure_schema(&mut conn, schema).await?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    /// Column names in table order.
    pub async fn columns(&self, table: &str, schema: &str) -> Result<Vec<String>> {
        validate_identifier(table)?;
        let mut conn = self.pool.acquire().await?;
        self.ensure_schema(&mut conn, schema).await?;

        let rows = sqlx::query(&format!("PRAGMA {}.table_info({})", quote(schema), quote(table)))
            .fetch_all(&mut *conn)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    /// Read a whole table back as records, in insertion order.
    pub async fn read_table(&self, table: &str, schema: &str) -> Result<Vec<Record>> {
        let name = qualified(schema, table)?;
        let mut conn = self.pool.acquire().await?;
        self.ensure_schema(&mut conn, schema).await?;

        let rows = sqlx::query(&format!("SELECT * FROM {name} ORDER BY rowid"))
            .fetch_all(&mut *conn)
            .await?;
        rows.iter()
            .map(|row| decode_row(row).map_err(Into::into))
            .collect()
    }

    /// Attach the database backing `schema` if this connection lacks it.
    async fn ensure_schema(&self, conn: &mut SqliteConnection, schema: &str) -> Result<()> {
        validate_identifier(schema)?;
        if schema == "main" {
            return Ok(());
        }

        let attached: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_database_list")
            .fetch_all(&mut *conn)
            .await?;
        if attached.iter().any(|name| name == schema) {
            return Ok(());
        }

        let target = match &self.location {
            Location::Memory => ":memory:".to_string(),
            Location::File(path) => schema_file(path, schema).to_string_lossy().into_owned(),
        };
        sqlx::query(&format!("ATTACH DATABASE ? AS {}", quote(schema)))
            .bind(target.as_str())
            .execute(&mut *conn)
            .await?;

        tracing::debug!(schema, target = %target, "attached schema");
        Ok(())
    }
}

#[async_trait]
impl Destination for SqliteDestination {
    async fn replace_table(&self, table: &str, schema: &str, rows: &[Record]) -> Result<usize> {
        let name = qualified(schema, table)?;

        let mut conn = self.pool.acquire().await?;
        // ATTACH is not allowed inside a transaction
        self.ensure_schema(&mut conn, schema).await?;

        if rows.is_empty() {
            // No rows to derive columns from: keep the shape, drop the rows
            if exists_on(&mut conn, schema, table).await? {
                sqlx::query(&format!("DELETE FROM {name}"))
                    .execute(&mut *conn)
                    .await?;
            }
            tracing::info!(schema, table, rows = 0, "replaced table");
            return Ok(0);
        }

        let columns = column_names(rows);
        let definitions: Vec<String> = columns
            .iter()
            .map(|c| format!("{} {}", quote(c), column_type(rows, c).sql()))
            .collect();
        let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();

        let mut tx = conn.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {name}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {name} ({})", definitions.join(", ")))
            .execute(&mut *tx)
            .await?;

        let per_statement = (MAX_BIND_PARAMS / columns.len()).max(1);
        for chunk in rows.chunks(per_statement) {
            let mut insert: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("INSERT INTO {name} ({}) ", column_list.join(", ")));
            insert.push_values(chunk, |mut values, row| {
                for column in &columns {
                    match row.get(column) {
                        Some(Scalar::Int(v)) => {
                            values.push_bind(*v);
                        }
                        Some(Scalar::Float(v)) => {
                            values.push_bind(*v);
                        }
                        Some(Scalar::Bool(v)) => {
                            values.push_bind(*v);
                        }
                        Some(Scalar::Str(v)) => {
                            values.push_bind(v.clone());
                        }
                        Some(Scalar::Null) | None => {
                            values.push_bind(None::<String>);
                        }
                    }
                }
            });
            insert.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::info!(
            schema,
            table,
            rows = rows.len(),
            columns = columns.len(),
            "replaced table"
        );
        Ok(rows.len())
    }
}

async fn exists_on(conn: &mut SqliteConnection, schema: &str, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?",
        quote(schema)
    ))
    .bind(table)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

fn pool_options() -> SqlitePoolOptions {
    // One long-lived connection: attached schemas (and in-memory data)
    // belong to the connection
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

fn schema_file(main: &Path, schema: &str) -> PathBuf {
    let stem = main
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "warehouse".to_string());
    main.with_file_name(format!("{stem}.{schema}.db"))
}

/// Storage class chosen for a column from the values it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Widest type across non-null values; all-null columns are TEXT.
fn column_type(rows: &[Record], column: &str) -> ColumnType {
    rows.iter()
        .filter_map(|row| match row.get(column) {
            Some(Scalar::Int(_)) | Some(Scalar::Bool(_)) => Some(ColumnType::Integer),
            Some(Scalar::Float(_)) => Some(ColumnType::Real),
            Some(Scalar::Str(_)) => Some(ColumnType::Text),
            Some(Scalar::Null) | None => None,
        })
        .max()
        .unwrap_or(ColumnType::Text)
}

fn decode_row(row: &SqliteRow) -> std::result::Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Scalar::Null
        } else {
            let kind = raw.type_info().name().to_string();
            match kind.as_str() {
                "INTEGER" => Scalar::Int(row.try_get_unchecked::<i64, _>(i)?),
                "REAL" => Scalar::float(row.try_get_unchecked::<f64, _>(i)?),
                _ => Scalar::Str(row.try_get_unchecked::<String, _>(i)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DestinationError::InvalidIdentifier(name.to_string()))
    }
}

fn qualified(schema: &str, table: &str) -> Result<String> {
    validate_identifier(schema)?;
    validate_identifier(table)?;
    Ok(format!("{}.{}", quote(schema), quote(table)))
}

/// Double-quote an identifier. Column names come from the data and may
/// contain anything, including quotes.
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
