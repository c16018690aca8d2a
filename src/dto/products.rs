use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{InventoryHistoryEntry, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    /// Generated when omitted or blank.
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub cost_price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub min_quantity: Option<i32>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub min_quantity: Option<i32>,
    pub category: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct InventoryHistoryList {
    #[schema(value_type = Vec<InventoryHistoryEntry>)]
    pub items: Vec<InventoryHistoryEntry>,
}
