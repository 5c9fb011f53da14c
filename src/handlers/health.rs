use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness plus a database ping; 503 when the database is unreachable.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthStatus),
        (status = 503, description = "Database unreachable", body = HealthStatus)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let database_up = crate::db::check_connection(&state.db).await.is_ok();
    let (code, status, database) = if database_up {
        (StatusCode::OK, "healthy", "up")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "down")
    };

    (
        code,
        Json(HealthStatus {
            status: status.to_string(),
            database: database.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}
