mod common;

use axum::{Router, body::Body, http::Request, routing::get};
use pos_server::routes::health::health_check;
use tower::ServiceExt;

use common::setup_state;

#[tokio::test]
async fn health_check_reports_database() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(state);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), 200);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(json["status"], "success");
    assert_eq!(json["message"], "Health check");
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["database"], "up");
    Ok(())
}
