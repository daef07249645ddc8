use axum::{extract::State, http::StatusCode, response::Json};
use diesel::connection::SimpleConnection;
use serde_json::{json, Value};
use tracing::error;

use crate::state::AppState;

/// Liveness plus a round trip to the database.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state
        .db()
        .map_err(|err| err.to_string())
        .and_then(|mut conn| conn.batch_execute("SELECT 1").map_err(|err| err.to_string()));

    match database {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
