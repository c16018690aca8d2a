use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, InventoryHistoryList, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    services::inventory::{self, CHANGE_TYPE_ADJUSTMENT, NewHistoryEntry, REASON_MANUAL_UPDATE},
    state::AppState,
};

const DUPLICATE_PRODUCT: &str = "SKU or barcode already exists";
pub const DEFAULT_MIN_QUANTITY: i32 = 10;

/// `(price - cost) / cost * 100`, two decimals, half away from zero. Zero when
/// the cost is zero or unknown.
pub fn profit_margin(price: Decimal, cost: Option<Decimal>) -> Decimal {
    let mut margin = match cost {
        Some(cost) if !cost.is_zero() => ((price - cost) * Decimal::ONE_HUNDRED)
            .checked_div(cost)
            .map(|m| m.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            .unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    };
    margin.rescale(2);
    margin
}

pub fn generate_sku(id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("SKU-{}", simple[..8].to_uppercase())
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_amounts(price: Decimal, cost: Decimal, quantity: i32, min_quantity: i32) -> AppResult<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::BadRequest("Price must be greater than zero".into()));
    }
    if cost < Decimal::ZERO {
        return Err(AppError::BadRequest("Cost price must not be negative".into()));
    }
    if quantity < 0 {
        return Err(AppError::BadRequest("Quantity must not be negative".into()));
    }
    if min_quantity < 0 {
        return Err(AppError::BadRequest("Minimum quantity must not be negative".into()));
    }
    Ok(())
}

pub async fn list_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .filter(Column::IsActive.eq(true))
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::listing(items.len());
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn get_by_barcode(state: &AppState, barcode: &str) -> AppResult<ApiResponse<Product>> {
    let result = Products::find()
        .filter(Column::Barcode.eq(barcode.trim()))
        .filter(Column::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    let price = money(payload.price);
    let cost_price = money(payload.cost_price.unwrap_or(Decimal::ZERO));
    let quantity = payload.quantity.unwrap_or(0);
    let min_quantity = payload.min_quantity.unwrap_or(DEFAULT_MIN_QUANTITY);
    validate_amounts(price, cost_price, quantity, min_quantity)?;

    let id = Uuid::new_v4();
    let sku = blank_to_none(payload.sku).unwrap_or_else(|| generate_sku(id));
    let now = Utc::now();
    let active = ActiveModel {
        id: Set(id),
        sku: Set(sku),
        barcode: Set(blank_to_none(payload.barcode)),
        name: Set(name),
        description: Set(blank_to_none(payload.description)),
        price: Set(price),
        cost_price: Set(cost_price),
        profit_margin: Set(profit_margin(price, Some(cost_price))),
        quantity: Set(quantity),
        min_quantity: Set(min_quantity),
        category: Set(blank_to_none(payload.category)),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let product = active
        .insert(&state.orm)
        .await
        .map_err(|e| AppError::from(e).classify(DUPLICATE_PRODUCT))?;

    tracing::info!(product_id = %product.id, sku = %product.sku, by = %user.user_id, "product created");
    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Partial update. The margin is recomputed from the resulting price and cost;
/// a stock change is recorded in the inventory history as an adjustment.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .filter(Column::IsActive.eq(true))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let previous_quantity = existing.quantity;
    let price = payload.price.map(money).unwrap_or(existing.price);
    let cost_price = payload.cost_price.map(money).unwrap_or(existing.cost_price);
    let quantity = payload.quantity.unwrap_or(existing.quantity);
    let min_quantity = payload.min_quantity.unwrap_or(existing.min_quantity);
    validate_amounts(price, cost_price, quantity, min_quantity)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name is required".into()));
        }
        active.name = Set(name);
    }
    if let Some(sku) = blank_to_none(payload.sku) {
        active.sku = Set(sku);
    }
    if payload.barcode.is_some() {
        active.barcode = Set(blank_to_none(payload.barcode));
    }
    if payload.description.is_some() {
        active.description = Set(blank_to_none(payload.description));
    }
    if payload.category.is_some() {
        active.category = Set(blank_to_none(payload.category));
    }
    active.price = Set(price);
    active.cost_price = Set(cost_price);
    active.profit_margin = Set(profit_margin(price, Some(cost_price)));
    active.quantity = Set(quantity);
    active.min_quantity = Set(min_quantity);
    active.updated_at = Set(Utc::now().into());

    let product = active
        .update(&txn)
        .await
        .map_err(|e| AppError::from(e).classify(DUPLICATE_PRODUCT))?;

    let delta = product.quantity - previous_quantity;
    if delta != 0 {
        inventory::insert_history(
            &txn,
            NewHistoryEntry {
                product_id: product.id,
                change_type: CHANGE_TYPE_ADJUSTMENT,
                quantity_change: delta,
                reason: REASON_MANUAL_UPDATE,
                user_id: Some(user.user_id),
            },
        )
        .await?;
    }
    txn.commit().await?;

    tracing::info!(product_id = %product.id, delta, by = %user.user_id, "product updated");
    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Soft delete: the row stays so historical sale items keep their reference.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::update_many()
        .col_expr(Column::IsActive, Expr::value(false))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(Column::Id.eq(id))
        .filter(Column::IsActive.eq(true))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    tracing::info!(product_id = %id, by = %user.user_id, "product deactivated");
    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn product_history(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<InventoryHistoryList>> {
    ensure_admin(user)?;
    if Products::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }
    let items = inventory::history_for_product(&state.orm, id).await?;
    let meta = Meta::listing(items.len());
    Ok(ApiResponse::success(
        "Inventory history",
        InventoryHistoryList { items },
        Some(meta),
    ))
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        sku: model.sku,
        barcode: model.barcode,
        name: model.name,
        description: model.description,
        price: model.price,
        cost_price: model.cost_price,
        profit_margin: model.profit_margin,
        quantity: model.quantity,
        min_quantity: model.min_quantity,
        category: model.category,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
