pub mod internal;
pub mod transactions;

use axum::{extract::State, Json};

use crate::schemas::HealthResponse;
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        armed_expiry_timers: state.service.armed_timers(),
        webhook_delivery: state.service.delivery_stats(),
    })
}
