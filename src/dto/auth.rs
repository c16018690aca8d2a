use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::SessionUser;

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}
