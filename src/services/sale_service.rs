//! Sale processing.
//!
//! A checkout moves through `Validating -> Computing -> Persisting` inside a
//! single transaction and ends `Committed` or `Aborted`. Any error rolls the
//! whole transaction back, so a failed cart leaves no sale, no line items, no
//! decrement and no history behind.

use std::fmt;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    dto::sales::{CreateSaleRequest, SaleLineRequest, SaleList, SaleReceipt, SaleWithItems},
    entity::{sale_items::ActiveModel as SaleItemActive, sales::ActiveModel as SaleActive},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Sale, SaleItem},
    response::{ApiResponse, Meta},
    services::inventory::{CHANGE_TYPE_SALE, InventoryLedger, NewHistoryEntry, REASON_SALE, Reservation},
    state::AppState,
};

pub const DEFAULT_PAYMENT_METHOD: &str = "cash";
pub const STATUS_COMPLETED: &str = "completed";
pub const RECENT_SALES_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalePhase {
    Started,
    Validating,
    Computing,
    Persisting,
    Committed,
    Aborted,
}

impl fmt::Display for SalePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SalePhase::Started => "started",
            SalePhase::Validating => "validating",
            SalePhase::Computing => "computing",
            SalePhase::Persisting => "persisting",
            SalePhase::Committed => "committed",
            SalePhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Rejects carts that can never succeed before any transaction is opened.
pub fn validate_lines(items: &[SaleLineRequest]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    if let Some(line) = items.iter().find(|line| line.quantity <= 0) {
        return Err(AppError::BadRequest(format!(
            "Quantity for product {} must be positive",
            line.product_id
        )));
    }
    Ok(())
}

pub fn payment_method_or_default(method: Option<String>) -> String {
    method
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string())
}

pub async fn process_sale(
    state: &AppState,
    user: &AuthUser,
    payload: CreateSaleRequest,
) -> AppResult<ApiResponse<SaleReceipt>> {
    validate_lines(&payload.items)?;
    let payment_method = payment_method_or_default(payload.payment_method);

    let mut phase = SalePhase::Started;
    let txn = state.orm.begin().await?;

    match run_sale(&txn, user.user_id, &payload.items, &payment_method, &mut phase).await {
        Ok(receipt) => {
            txn.commit()
                .await
                .map_err(|e| AppError::from(e).classify("Sale conflict"))?;
            tracing::info!(
                sale_id = %receipt.sale_id,
                user_id = %user.user_id,
                total = %receipt.total_amount,
                lines = payload.items.len(),
                phase = %SalePhase::Committed,
                "sale completed"
            );
            Ok(ApiResponse::success("Sale completed", receipt, Some(Meta::empty())))
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "sale rollback failed");
            }
            let err = err.classify("Sale conflict");
            tracing::warn!(
                user_id = %user.user_id,
                failed_in = %phase,
                phase = %SalePhase::Aborted,
                error = %err,
                "sale aborted"
            );
            Err(err)
        }
    }
}

async fn run_sale(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    items: &[SaleLineRequest],
    payment_method: &str,
    phase: &mut SalePhase,
) -> AppResult<SaleReceipt> {
    *phase = SalePhase::Validating;
    let mut ledger = InventoryLedger::new(txn);
    let mut reservations: Vec<Reservation> = Vec::with_capacity(items.len());
    for line in items {
        reservations.push(ledger.check_and_reserve(line.product_id, line.quantity).await?);
    }

    *phase = SalePhase::Computing;
    let total_amount: Decimal = reservations.iter().map(Reservation::subtotal).sum();
    tracing::debug!(total = %total_amount, lines = reservations.len(), "sale total computed");

    *phase = SalePhase::Persisting;
    let sale_id = Uuid::new_v4();
    SaleActive {
        id: Set(sale_id),
        user_id: Set(Some(user_id)),
        total_amount: Set(total_amount),
        payment_method: Set(payment_method.to_string()),
        status: Set(STATUS_COMPLETED.into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(txn)
    .await?;

    for reservation in &reservations {
        SaleItemActive {
            id: Set(Uuid::new_v4()),
            sale_id: Set(sale_id),
            product_id: Set(reservation.product_id),
            quantity: Set(reservation.quantity),
            unit_price: Set(reservation.unit_price),
            subtotal: Set(reservation.subtotal()),
        }
        .insert(txn)
        .await?;

        ledger.decrement(reservation).await?;

        ledger
            .record_history(NewHistoryEntry {
                product_id: reservation.product_id,
                change_type: CHANGE_TYPE_SALE,
                quantity_change: -reservation.quantity,
                reason: REASON_SALE,
                user_id: Some(user_id),
            })
            .await?;
    }

    Ok(SaleReceipt {
        sale_id,
        total_amount,
    })
}

const SALE_COLUMNS: &str = r#"
    SELECT s.id, s.user_id, s.total_amount, s.payment_method, s.status, s.created_at,
           u.display_name AS cashier_name
    FROM sales s
    LEFT JOIN users u ON u.id = s.user_id
"#;

pub async fn list_recent_sales(state: &AppState) -> AppResult<ApiResponse<SaleList>> {
    let sql = format!("{SALE_COLUMNS} ORDER BY s.created_at DESC LIMIT $1");
    let items = sqlx::query_as::<_, Sale>(&sql)
        .bind(RECENT_SALES_LIMIT)
        .fetch_all(&state.pool)
        .await?;

    let meta = Meta::listing(items.len());
    Ok(ApiResponse::success("Sales", SaleList { items }, Some(meta)))
}

/// Line items join products without an `is_active` filter, so sales of
/// since-deleted products stay readable.
pub async fn get_sale(state: &AppState, id: Uuid) -> AppResult<ApiResponse<SaleWithItems>> {
    let sql = format!("{SALE_COLUMNS} WHERE s.id = $1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Sale"))?;

    let items = sqlx::query_as::<_, SaleItem>(
        r#"
        SELECT si.id, si.sale_id, si.product_id, p.name AS product_name,
               si.quantity, si.unit_price, si.subtotal
        FROM sale_items si
        JOIN products p ON p.id = si.product_id
        WHERE si.sale_id = $1
        ORDER BY p.name
        "#,
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Sale",
        SaleWithItems { sale, items },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32) -> SaleLineRequest {
        SaleLineRequest {
            product_id: Uuid::new_v4(),
            quantity,
        }
    }

    #[test]
    fn empty_cart_is_a_validation_error() {
        assert!(matches!(validate_lines(&[]), Err(AppError::BadRequest(msg)) if msg == "Cart is empty"));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        assert!(validate_lines(&[line(1), line(0)]).is_err());
        assert!(validate_lines(&[line(-2)]).is_err());
        assert!(validate_lines(&[line(1), line(5)]).is_ok());
    }

    #[test]
    fn payment_method_defaults_to_cash() {
        assert_eq!(payment_method_or_default(None), "cash");
        assert_eq!(payment_method_or_default(Some("  ".into())), "cash");
        assert_eq!(payment_method_or_default(Some("Card".into())), "card");
    }
}
