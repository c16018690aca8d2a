use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub database: String,
}

impl HealthData {
    pub fn from_probe(database_ok: bool) -> Self {
        let (status, database) = if database_ok {
            ("ok", "up")
        } else {
            ("degraded", "down")
        };
        Self {
            status: status.to_string(),
            database: database.to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
    ),
    security(()),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let database_ok = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health probe failed");
            false
        }
    };

    Json(ApiResponse::success(
        "Health check",
        HealthData::from_probe(database_ok),
        Some(Meta::empty()),
    ))
}
