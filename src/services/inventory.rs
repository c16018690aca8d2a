//! Inventory ledger: the only writer of `products.quantity` during a sale.
//!
//! Reservation takes a `FOR UPDATE` lock on the product row inside the
//! caller's transaction. The lock is held until that transaction commits or
//! rolls back, so two carts sharing a product are serialized while carts over
//! disjoint products proceed concurrently.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    entity::{
        inventory_history::{
            ActiveModel as HistoryActive, Column as HistoryCol, Entity as InventoryHistory,
            Model as HistoryModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::InventoryHistoryEntry,
};

pub const CHANGE_TYPE_SALE: &str = "sale";
pub const REASON_SALE: &str = "Sale";
pub const CHANGE_TYPE_ADJUSTMENT: &str = "adjustment";
pub const REASON_MANUAL_UPDATE: &str = "Manual update";

/// A locked, stock-checked line of a sale.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl Reservation {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry<'a> {
    pub product_id: Uuid,
    pub change_type: &'a str,
    pub quantity_change: i32,
    pub reason: &'a str,
    pub user_id: Option<Uuid>,
}

pub struct InventoryLedger<'t> {
    txn: &'t DatabaseTransaction,
    /// Quantity already reserved per product earlier in this transaction.
    reserved: HashMap<Uuid, i32>,
}

impl<'t> InventoryLedger<'t> {
    pub fn new(txn: &'t DatabaseTransaction) -> Self {
        Self {
            txn,
            reserved: HashMap::new(),
        }
    }

    /// Lock the product row and confirm it can cover `quantity` on top of
    /// whatever this transaction has already reserved for it. Re-locking a
    /// row the transaction already holds does not block.
    pub async fn check_and_reserve(&mut self, product_id: Uuid, quantity: i32) -> AppResult<Reservation> {
        let product = Products::find_by_id(product_id)
            .filter(ProdCol::IsActive.eq(true))
            .lock(LockType::Update)
            .one(self.txn)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Product {product_id}")))?;

        let already = self.reserved.get(&product_id).copied().unwrap_or(0);
        let wanted = already
            .checked_add(quantity)
            .ok_or_else(|| AppError::BadRequest("Quantity is too large".into()))?;
        if product.quantity < wanted {
            tracing::debug!(
                product_id = %product_id,
                on_hand = product.quantity,
                wanted,
                "insufficient stock"
            );
            return Err(AppError::InsufficientStock {
                product: product.name,
            });
        }
        self.reserved.insert(product_id, wanted);

        Ok(Reservation {
            product_id,
            product_name: product.name,
            unit_price: product.price,
            quantity,
        })
    }

    /// The `quantity >= n` guard keeps the stored count from going below zero
    /// even if a caller skipped reservation.
    pub async fn decrement(&self, reservation: &Reservation) -> AppResult<()> {
        let result = Products::update_many()
            .col_expr(
                ProdCol::Quantity,
                Expr::col(ProdCol::Quantity).sub(reservation.quantity),
            )
            .col_expr(ProdCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(ProdCol::Id.eq(reservation.product_id))
            .filter(ProdCol::Quantity.gte(reservation.quantity))
            .exec(self.txn)
            .await?;

        if result.rows_affected != 1 {
            tracing::warn!(product_id = %reservation.product_id, "stock floor rejected decrement");
            return Err(AppError::InsufficientStock {
                product: reservation.product_name.clone(),
            });
        }
        Ok(())
    }

    pub async fn record_history(&self, entry: NewHistoryEntry<'_>) -> AppResult<()> {
        insert_history(self.txn, entry).await
    }
}

pub async fn insert_history<C: ConnectionTrait>(db: &C, entry: NewHistoryEntry<'_>) -> AppResult<()> {
    HistoryActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(entry.product_id),
        change_type: Set(entry.change_type.to_string()),
        quantity_change: Set(entry.quantity_change),
        reason: Set(Some(entry.reason.to_string())),
        user_id: Set(entry.user_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    Ok(())
}

pub async fn history_for_product<C: ConnectionTrait>(
    db: &C,
    product_id: Uuid,
) -> AppResult<Vec<InventoryHistoryEntry>> {
    let entries = InventoryHistory::find()
        .filter(HistoryCol::ProductId.eq(product_id))
        .order_by_desc(HistoryCol::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(history_from_entity)
        .collect();
    Ok(entries)
}

fn history_from_entity(model: HistoryModel) -> InventoryHistoryEntry {
    InventoryHistoryEntry {
        id: model.id,
        product_id: model.product_id,
        change_type: model.change_type,
        quantity_change: model.quantity_change,
        reason: model.reason,
        user_id: model.user_id,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
