pub mod auth_service;
pub mod dashboard_service;
pub mod inventory;
pub mod product_service;
pub mod sale_service;
pub mod session_service;
pub mod user_service;
