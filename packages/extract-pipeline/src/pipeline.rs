//! Extraction steps.
//!
//! One [`ExtractStep`] per domain: walk the record service, then replace
//! the domain's raw table while holding the destination writer lock.

use std::sync::Arc;

use async_trait::async_trait;
use record_service::{catalog, column_names, DomainSpec};
use tracing::info;

use crate::client::{Filters, PageSource, RecordClient};
use crate::config::PipelineConfig;
use crate::dag::{Dag, Step, StepContext, StepMetadata, DESTINATION_WRITER};
use crate::destination::Destination;
use crate::error::{PipelineError, Result};
use crate::walker::{walk_all, DEFAULT_PAGE_SIZE};

/// Which upstream system serves a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Sis,
    Lms,
    State,
}

impl Upstream {
    fn base_url(self, config: &PipelineConfig) -> &str {
        match self {
            Upstream::Sis => &config.sis_api_url,
            Upstream::Lms => &config.lms_api_url,
            Upstream::State => &config.state_api_url,
        }
    }
}

/// A domain extraction: source system, resource and destination table.
#[derive(Debug, Clone, Copy)]
pub struct ExtractSpec {
    pub name: &'static str,
    pub upstream: Upstream,
    pub domain: &'static DomainSpec,
    pub table: &'static str,
}

pub const ATTENDANCE: ExtractSpec = ExtractSpec {
    name: "attendance",
    upstream: Upstream::Sis,
    domain: &catalog::ATTENDANCE,
    table: "attendance",
};

pub const GRADEBOOK: ExtractSpec = ExtractSpec {
    name: "gradebook",
    upstream: Upstream::Lms,
    domain: &catalog::GRADEBOOK,
    table: "gradebook",
};

pub const ISAT: ExtractSpec = ExtractSpec {
    name: "isat",
    upstream: Upstream::State,
    domain: &catalog::ISAT,
    table: "isat",
};

pub const EXTRACTS: [ExtractSpec; 3] = [ATTENDANCE, GRADEBOOK, ISAT];

pub struct ExtractStep {
    name: String,
    source: Arc<dyn PageSource>,
    filters: Filters,
    page_size: usize,
    destination: Arc<dyn Destination>,
    schema: String,
    table: String,
}

impl ExtractStep {
    /// Step named `name` writing to `raw.<name>` with the default page size.
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn PageSource>,
        destination: Arc<dyn Destination>,
    ) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            source,
            filters: Filters::new(),
            page_size: DEFAULT_PAGE_SIZE,
            destination,
            schema: "raw".to_string(),
        }
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_target(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.schema = schema.into();
        self.table = table.into();
        self
    }
}

#[async_trait]
impl Step for ExtractStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: StepContext) -> Result<StepMetadata> {
        let walk = walk_all(
            self.source.as_ref(),
            &self.filters,
            self.page_size,
            &ctx.cancel,
        )
        .await?;

        info!(
            step = %self.name,
            source = %self.source.describe(),
            records = walk.records.len(),
            pages = walk.pages,
            "walk complete"
        );

        let columns = column_names(&walk.records);
        let row_count = {
            let _writer = ctx.locks.acquire(DESTINATION_WRITER).await;
            if ctx.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            self.destination
                .replace_table(&self.table, &self.schema, &walk.records)
                .await?
        };

        Ok(StepMetadata {
            table: format!("{}.{}", self.schema, self.table),
            row_count,
            columns,
            pages: walk.pages,
        })
    }
}

/// Build the step graph for every domain.
///
/// Steps are independent unless `sequential` is set, in which case each one
/// depends on the previous and a failure skips the rest.
pub fn build_pipeline(
    config: &PipelineConfig,
    destination: Arc<dyn Destination>,
    sequential: bool,
) -> Result<Dag> {
    let mut dag = Dag::new();
    let mut previous: Option<&str> = None;

    for extract in EXTRACTS {
        let client = RecordClient::new(
            extract.upstream.base_url(config),
            extract.domain.resource,
            config.api_timeout,
        )?;
        let step = ExtractStep::new(extract.name, Arc::new(client), destination.clone())
            .with_page_size(config.page_size)
            .with_target(&config.raw_schema, extract.table);

        let deps: Vec<&str> = match (sequential, previous) {
            (true, Some(prev)) => vec![prev],
            _ => Vec::new(),
        };
        dag.add_step(Arc::new(step), &deps)?;
        previous = Some(extract.name);
    }

    Ok(dag)
}
