use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use diesel::RunQueryDsl;
use serde_json::json;
use tracing::warn;

use crate::error::{blocking, ApiResult};
use crate::router::AppState;

// Handler for GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pool = state.pool.clone();
    let probe: ApiResult<()> = blocking(move || {
        let mut conn = pool.get()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    })
    .await;

    match probe {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
