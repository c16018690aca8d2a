use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Sale, SaleItem};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateSaleRequest {
    #[serde(default)]
    pub items: Vec<SaleLineRequest>,
    /// Defaults to `cash`.
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SaleReceipt {
    pub sale_id: Uuid,
    pub total_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SaleList {
    #[schema(value_type = Vec<Sale>)]
    pub items: Vec<Sale>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}
