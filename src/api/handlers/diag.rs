use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;

/// `GET /diag/drive` — destination reachability and visible items.
pub async fn drive_diagnostics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.storage.diagnostics().await)
}
