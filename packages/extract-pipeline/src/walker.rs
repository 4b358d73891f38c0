//! Pagination walker.
//!
//! Materializes a filtered dataset by requesting fixed-size pages at
//! increasing offsets until a short page comes back. Not safe against a
//! source that changes mid-walk: rows can be skipped or repeated if the
//! filtered size shifts between requests.

use record_service::Record;
use tokio_util::sync::CancellationToken;

use crate::client::{Filters, PageSource};
use crate::error::ClientError;

/// Page size used by pipeline steps unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Every record of a walk plus how many requests it took.
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    pub records: Vec<Record>,
    pub pages: usize,
    /// `total` reported by the last page
    pub reported_total: usize,
}

/// Fetch every matching record, in the source's order.
///
/// Any failed request aborts the walk; nothing is retried and no partial
/// result is returned. Cancellation is checked before each request and
/// also interrupts a request in flight.
pub async fn walk_all(
    source: &dyn PageSource,
    filters: &Filters,
    page_size: usize,
    cancel: &CancellationToken,
) -> Result<WalkResult, ClientError> {
    if page_size == 0 {
        return Err(ClientError::InvalidPageSize(page_size));
    }

    let mut result = WalkResult::default();
    let mut offset = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let page = tokio::select! {
            page = source.list(filters, page_size, offset) => page?,
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
        };

        let received = page.data.len();
        result.pages += 1;
        result.reported_total = page.total;
        result.records.extend(page.data);

        tracing::debug!(
            source = %source.describe(),
            offset,
            received,
            total = page.total,
            "fetched page"
        );

        if received < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(result)
}
