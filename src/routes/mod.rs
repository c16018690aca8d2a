use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod dashboard;
pub mod doc;
pub mod health;
pub mod products;
pub mod sales;
pub mod users;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/sales", sales::router())
        .nest("/dashboard", dashboard::router())
}
