use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{repository::table_service::ping, state::AppState};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    // Bounded so the healthcheck answers even when the first connection hangs.
    let db_ok = match tokio::time::timeout(Duration::from_secs(3), ping(&state.store)).await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            tracing::error!(error = %error, "Health check storage ping failed");
            false
        }
        Err(_) => {
            tracing::error!("Health check storage ping timed out (3s)");
            false
        }
    };

    let status = if db_ok { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "now": Utc::now().to_rfc3339(),
        "db": db_ok,
        "storage": state.store.backend_name(),
    }))
}
