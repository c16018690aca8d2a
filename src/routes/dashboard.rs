use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    models::DashboardSnapshot,
    response::ApiResponse,
    services::dashboard_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Aggregate snapshot", body = ApiResponse<DashboardSnapshot>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<DashboardSnapshot>>> {
    let resp = dashboard_service::dashboard(&state).await?;
    Ok(Json(resp))
}
