//! Extract/load pipeline for the IETA record services.
//!
//! For each domain the pipeline walks a record service page by page and
//! replaces the matching table in the SQLite warehouse. Steps run
//! concurrently; warehouse writes are serialized through a named lock.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use extract_pipeline::{build_pipeline, PipelineConfig, SqliteDestination, StepContext};
//!
//! let config = PipelineConfig::from_env()?;
//! let warehouse = Arc::new(SqliteDestination::open(&config.warehouse_path).await?);
//! let dag = build_pipeline(&config, warehouse, false)?;
//! let report = dag.execute(StepContext::default()).await?;
//! ```
//!
//! # Modules
//!
//! - [`client`] - HTTP client for one record service resource
//! - [`walker`] - Offset pagination until a short page
//! - [`destination`] - Warehouse tables, replaced in one transaction
//! - [`dag`] - Step graph executor and named resource locks
//! - [`pipeline`] - Per-domain extraction steps

pub mod client;
pub mod config;
pub mod dag;
pub mod destination;
pub mod error;
pub mod pipeline;
pub mod walker;

pub use client::{AttendanceFilter, Filters, GradebookFilter, IsatFilter, PageSource, RecordClient};
pub use config::PipelineConfig;
pub use dag::{
    Dag, ResourceLocks, RunReport, SkipReason, Step, StepContext, StepMetadata, StepOutcome,
    DESTINATION_WRITER,
};
pub use destination::{Destination, SqliteDestination};
pub use error::{ClientError, DestinationError, PipelineError, Result};
pub use pipeline::{build_pipeline, ExtractSpec, ExtractStep, EXTRACTS};
pub use walker::{walk_all, WalkResult, DEFAULT_PAGE_SIZE};
