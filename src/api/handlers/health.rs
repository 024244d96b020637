use axum::{Json, response::IntoResponse};
use chrono::Utc;
use serde::Serialize;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

/// `GET /` — liveness banner.
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "LINE Drive relay is running".to_string(),
        status: "active".to_string(),
    })
}

/// `GET /health` — liveness with timestamp and build version.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
