use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::server::app::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub system: String,
    pub endpoints: Vec<String>,
}

/// Liveness check listing the resources this service exposes.
///
/// Always healthy once the process is serving; dataset availability is
/// reported per request instead.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        system: state.system.name().to_string(),
        endpoints: state.system.endpoints(),
    })
}
