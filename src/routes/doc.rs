use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse},
        products::{CreateProductRequest, InventoryHistoryList, ProductList, UpdateProductRequest},
        sales::{CreateSaleRequest, SaleLineRequest, SaleList, SaleReceipt, SaleWithItems},
        users::{CreateUserRequest, UpdateUserRequest, UserList},
    },
    models::{DashboardSnapshot, InventoryHistoryEntry, Product, Sale, SaleItem, SessionUser, User},
    response::{ApiResponse, Meta, Status},
    routes::{auth, dashboard, health, products, sales, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Opaque session token returned by /api/login"))
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        auth::me,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        products::list_products,
        products::get_product,
        products::get_by_barcode,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::product_history,
        sales::create_sale,
        sales::list_sales,
        sales::get_sale,
        dashboard::dashboard
    ),
    components(
        schemas(
            User,
            SessionUser,
            Product,
            Sale,
            SaleItem,
            InventoryHistoryEntry,
            DashboardSnapshot,
            LoginRequest,
            LoginResponse,
            CreateUserRequest,
            UpdateUserRequest,
            UserList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            InventoryHistoryList,
            SaleLineRequest,
            CreateSaleRequest,
            SaleReceipt,
            SaleList,
            SaleWithItems,
            health::HealthData,
            Meta,
            Status,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<SaleReceipt>,
            ApiResponse<SaleWithItems>,
            ApiResponse<DashboardSnapshot>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Login, logout and current identity"),
        (name = "Users", description = "Account management (admin)"),
        (name = "Products", description = "Catalog and stock"),
        (name = "Sales", description = "Checkout and sales history"),
        (name = "Dashboard", description = "Daily aggregates"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
