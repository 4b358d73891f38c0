use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::catalog::{DomainSpec, KeySpec};
use crate::error::Result;
use crate::query::{KeyLookup, ListQuery};
use crate::record::{Lookup, PageResult};
use crate::server::app::AppState;

/// `GET /<resource>`: filtered, paginated listing.
///
/// Parameters are validated before the dataset is touched, so a bad `limit`
/// is reported even when the backing file is missing.
pub async fn list_handler(
    domain: &'static DomainSpec,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PageResult>> {
    let query = ListQuery::from_params(domain, &params)?;
    let table = state.loader.load(domain.dataset).await?;
    let page = query.apply(table);

    tracing::debug!(
        resource = domain.resource,
        filters = query.filters.len(),
        offset = page.offset,
        total = page.total,
        returned = page.data.len(),
        "listed records"
    );

    Ok(Json(page))
}

/// `GET /<resource>/<key>`: primary-key lookup.
///
/// A malformed key is rejected before the dataset is loaded.
pub async fn lookup_handler(
    domain: &'static DomainSpec,
    key: KeySpec,
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Lookup>> {
    let lookup = KeyLookup::parse(&key, &raw)?;
    let table = state.loader.load(domain.dataset).await?;
    let found = lookup.apply(table)?;

    tracing::debug!(resource = domain.resource, key = %raw, "looked up record");
    Ok(Json(found))
}
