use axum::extract::State;
use axum::response::IntoResponse;

use crate::AppState;

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_handle.render()
}
