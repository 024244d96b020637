pub mod api;
pub mod config;
pub mod line;
pub mod services;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::StorageClient;
use crate::services::pipeline::UploadPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<UploadPipeline>,
    pub storage: Arc<dyn StorageClient>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .route("/diag/drive", get(api::handlers::diag::drive_diagnostics))
        // The original deployment answered on /callback; keep both paths.
        .route("/webhook", post(api::handlers::webhook::callback))
        .route("/callback", post(api::handlers::webhook::callback))
        .with_state(state)
}
