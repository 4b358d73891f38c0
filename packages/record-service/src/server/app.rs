//! Application setup and router construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::System;
use crate::loader::DatasetLoader;
use crate::server::routes::{health_handler, list_handler, lookup_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub system: System,
    pub loader: Arc<dyn DatasetLoader>,
}

/// Build the router for one system.
///
/// Every domain of the system gets a listing route and, when it declares a
/// primary key, a lookup route. The loader is the only dependency; nothing
/// is read at construction time.
pub fn build_router(system: System, loader: Arc<dyn DatasetLoader>) -> Router {
    let state = AppState { system, loader };

    let mut router = Router::new().route("/", get(health_handler));

    for &domain in system.domains() {
        let path = format!("/{}", domain.resource);
        router = router.route(
            &path,
            get(
                move |state: State<AppState>, params: Query<HashMap<String, String>>| {
                    list_handler(domain, state, params)
                },
            ),
        );

        if let Some(key) = domain.key {
            router = router.route(
                &format!("{path}/:key"),
                get(move |state: State<AppState>, raw: Path<String>| {
                    lookup_handler(domain, key, state, raw)
                }),
            );
        }
    }

    // Read-only API, any origin may call it
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET]);

    router
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// [`build_router`] plus a per-request deadline.
pub fn build_app(system: System, loader: Arc<dyn DatasetLoader>, request_timeout: Duration) -> Router {
    build_router(system, loader).layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        request_timeout,
    ))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}
