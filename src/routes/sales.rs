use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::sales::{CreateSaleRequest, SaleList, SaleReceipt, SaleWithItems},
    error::AppResult,
    middleware::{auth::AuthUser, json::ApiJson},
    response::ApiResponse,
    services::sale_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales).post(create_sale))
        .route("/{id}", get(get_sale))
}

#[utoipa::path(
    post,
    path = "/api/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 200, description = "Sale completed", body = ApiResponse<SaleReceipt>),
        (status = 400, description = "Empty cart or invalid quantity"),
        (status = 404, description = "Unknown product"),
        (status = 409, description = "Insufficient stock"),
        (status = 503, description = "Lock contention, retry")
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(payload): ApiJson<CreateSaleRequest>,
) -> AppResult<Json<ApiResponse<SaleReceipt>>> {
    let resp = sale_service::process_sale(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sales",
    responses(
        (status = 200, description = "Newest 100 sales with cashier name", body = ApiResponse<SaleList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<ApiResponse<SaleList>>> {
    let resp = sale_service::list_recent_sales(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    params(("id" = Uuid, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale with line items", body = ApiResponse<SaleWithItems>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SaleWithItems>>> {
    let resp = sale_service::get_sale(&state, id).await?;
    Ok(Json(resp))
}
