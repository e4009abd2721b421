//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health: liveness plus the device this server drives.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let device = state.pipeline.device();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "device": {
            "host": device.host,
            "device_type": device.device_type,
        },
    }))
}
