//! Record services for the IETA education-data demo.
//!
//! Each service exposes one or more tabular datasets (attendance, gradebook,
//! ISAT assessment scores) as filtered, paginated REST reads. Datasets live in
//! flat Parquet files and are re-read on every request, so the service holds
//! no mutable state and reflects the latest on-disk data.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use record_service::{build_router, ParquetLoader, System};
//!
//! let loader = Arc::new(ParquetLoader::new("./data"));
//! let app = build_router(System::Sis, loader);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8001").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Modules
//!
//! - [`record`] - Scalar values, records and page payloads shared with clients
//! - [`catalog`] - Domain definitions (filters, primary keys) and systems
//! - [`query`] - Query validation, filtering and offset/limit slicing
//! - [`loader`] - Dataset loaders (Parquet on disk, in-memory)
//! - [`server`] - Axum router and handlers
//! - [`seeds`] - Synthetic seed data generator

pub mod catalog;
pub mod config;
pub mod error;
pub mod loader;
pub mod query;
pub mod record;
pub mod seeds;
pub mod server;

pub use catalog::{DomainSpec, FieldKind, FilterSpec, KeySpec, LookupShape, System};
pub use config::Config;
pub use error::{LoadError, SeedError, ServiceError};
pub use loader::{DatasetLoader, MemoryLoader, ParquetLoader};
pub use query::{KeyLookup, ListQuery, DEFAULT_LIMIT, MAX_LIMIT, MIN_LIMIT};
pub use record::{column_names, Lookup, PageResult, Record, Scalar};
pub use server::{build_app, build_router, AppState};
