use crate::{
    AppState,
    handlers::{auth, categories, orders, products, uploads},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Everything a signed-in account can reach. Plain users are scoped to their own
/// documents inside the handlers; admins see everything.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/api/auth/me", get(auth::me))
        // POST /api/upload/presigned
        // Short-lived S3 PUT URL for a product image.
        .route("/api/upload/presigned", post(uploads::get_presigned_url))
        // --- Categories ---
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/categories/{id}",
            get(categories::get_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        // --- Products ---
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/products/{id}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        // --- Orders ---
        // GET /api/orders lists every order; the handler rejects non-admins with 403.
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/api/orders/my-orders", get(orders::my_orders))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/pay", put(orders::pay_order))
}
