mod common;

use pos_server::{
    dto::sales::{CreateSaleRequest, SaleLineRequest},
    error::AppError,
    services::{product_service, sale_service},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{count_rows, create_admin, create_cashier, create_product, setup_state, stock_of};

fn cart(lines: &[(Uuid, i32)]) -> CreateSaleRequest {
    CreateSaleRequest {
        items: lines
            .iter()
            .map(|&(product_id, quantity)| SaleLineRequest { product_id, quantity })
            .collect(),
        payment_method: None,
    }
}

#[tokio::test]
async fn completed_sale_decrements_stock_and_records_history() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let cashier = create_cashier(&state).await?;
    let mug = create_product(&state, &admin, 1250, 10).await?;
    let beans = create_product(&state, &admin, 1899, 5).await?;

    let resp = sale_service::process_sale(&state, &cashier, cart(&[(mug.id, 3), (beans.id, 1)])).await?;
    let receipt = resp.data.expect("receipt");
    assert_eq!(receipt.total_amount, Decimal::new(5649, 2));

    assert_eq!(stock_of(&state, mug.id).await?, 7);
    assert_eq!(stock_of(&state, beans.id).await?, 4);

    let detail = sale_service::get_sale(&state, receipt.sale_id).await?.data.expect("sale");
    assert_eq!(detail.sale.payment_method, "cash");
    assert_eq!(detail.sale.status, "completed");
    assert_eq!(detail.sale.user_id, Some(cashier.user_id));
    assert_eq!(detail.sale.cashier_name.as_deref(), Some(cashier.display_name.as_str()));
    assert_eq!(detail.items.len(), 2);
    let line_sum: Decimal = detail.items.iter().map(|item| item.subtotal).sum();
    assert_eq!(line_sum, detail.sale.total_amount);

    let history = product_service::product_history(&state, &admin, mug.id)
        .await?
        .data
        .expect("history")
        .items;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].change_type, "sale");
    assert_eq!(history[0].quantity_change, -3);
    assert_eq!(history[0].reason.as_deref(), Some("Sale"));
    assert_eq!(history[0].user_id, Some(cashier.user_id));

    let recent = sale_service::list_recent_sales(&state).await?.data.expect("sales").items;
    assert!(recent.iter().any(|s| s.id == receipt.sale_id));
    Ok(())
}

#[tokio::test]
async fn empty_cart_is_rejected_without_side_effects() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let cashier = create_cashier(&state).await?;

    let result = sale_service::process_sale(&state, &cashier, cart(&[])).await;
    assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg == "Cart is empty"));

    let sales = count_rows(&state, "SELECT COUNT(*) FROM sales WHERE user_id = $1", cashier.user_id).await?;
    assert_eq!(sales, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_product_rolls_back_earlier_lines() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let cashier = create_cashier(&state).await?;
    let real = create_product(&state, &admin, 500, 10).await?;

    let result =
        sale_service::process_sale(&state, &cashier, cart(&[(real.id, 2), (Uuid::new_v4(), 1)])).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    assert_eq!(stock_of(&state, real.id).await?, 10);
    let sales = count_rows(&state, "SELECT COUNT(*) FROM sales WHERE user_id = $1", cashier.user_id).await?;
    assert_eq!(sales, 0);
    let history = count_rows(
        &state,
        "SELECT COUNT(*) FROM inventory_history WHERE product_id = $1",
        real.id,
    )
    .await?;
    assert_eq!(history, 0);
    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rolls_back_whole_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let cashier = create_cashier(&state).await?;
    let plenty = create_product(&state, &admin, 300, 20).await?;
    let scarce = create_product(&state, &admin, 700, 3).await?;

    let result =
        sale_service::process_sale(&state, &cashier, cart(&[(plenty.id, 4), (scarce.id, 5)])).await;
    match result {
        Err(AppError::InsufficientStock { product }) => assert_eq!(product, scarce.name),
        other => panic!("expected insufficient stock, got {other:?}"),
    }

    assert_eq!(stock_of(&state, plenty.id).await?, 20);
    assert_eq!(stock_of(&state, scarce.id).await?, 3);
    let sales = count_rows(&state, "SELECT COUNT(*) FROM sales WHERE user_id = $1", cashier.user_id).await?;
    assert_eq!(sales, 0);
    Ok(())
}

#[tokio::test]
async fn repeated_lines_are_checked_against_combined_quantity() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let cashier = create_cashier(&state).await?;
    let product = create_product(&state, &admin, 100, 5).await?;

    let result =
        sale_service::process_sale(&state, &cashier, cart(&[(product.id, 3), (product.id, 3)])).await;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
    assert_eq!(stock_of(&state, product.id).await?, 5);

    sale_service::process_sale(&state, &cashier, cart(&[(product.id, 2), (product.id, 3)])).await?;
    assert_eq!(stock_of(&state, product.id).await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_never_oversell() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let product = create_product(&state, &admin, 999, 7).await?;

    let mut handles = Vec::new();
    for _ in 0..7 {
        let state = state.clone();
        let cashier = create_cashier(&state).await?;
        let product_id = product.id;
        handles.push(tokio::spawn(async move {
            sale_service::process_sale(&state, &cashier, cart(&[(product_id, 2)])).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(AppError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(stock_of(&state, product.id).await?, 1);
    let history = count_rows(
        &state,
        "SELECT COUNT(*) FROM inventory_history WHERE product_id = $1",
        product.id,
    )
    .await?;
    assert_eq!(history, 3);
    Ok(())
}

#[tokio::test]
async fn deleted_product_is_hidden_but_past_sales_stay_readable() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let cashier = create_cashier(&state).await?;
    let product = create_product(&state, &admin, 450, 4).await?;

    let receipt = sale_service::process_sale(&state, &cashier, cart(&[(product.id, 1)]))
        .await?
        .data
        .expect("receipt");

    product_service::delete_product(&state, &admin, product.id).await?;

    let listed = product_service::list_products(&state).await?.data.expect("products").items;
    assert!(listed.iter().all(|p| p.id != product.id));
    assert!(matches!(
        product_service::get_product(&state, product.id).await,
        Err(AppError::NotFound(_))
    ));

    let again = sale_service::process_sale(&state, &cashier, cart(&[(product.id, 1)])).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));

    let detail = sale_service::get_sale(&state, receipt.sale_id).await?.data.expect("sale");
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].product_name, product.name);
    Ok(())
}

#[tokio::test]
async fn cashier_cannot_manage_catalog() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_admin(&state).await?;
    let cashier = create_cashier(&state).await?;
    let product = create_product(&state, &admin, 100, 1).await?;

    let result = product_service::delete_product(&state, &cashier, product.id).await;
    assert!(matches!(result, Err(AppError::Forbidden)));
    let result = product_service::product_history(&state, &cashier, product.id).await;
    assert!(matches!(result, Err(AppError::Forbidden)));
    Ok(())
}
