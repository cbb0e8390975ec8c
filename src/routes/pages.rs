use crate::{AppState, handlers::pages};
use axum::{Router, routing::get};

/// Pages Router Module
///
/// JSON view models for the dashboard frontend. Access is decided by the page guard
/// before these handlers run: anonymous visitors are redirected to `/login` and
/// role mismatches to `/dashboard?error=unauthorized`.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::root))
        .route("/login", get(pages::login_page))
        .route("/register", get(pages::register_page))
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/products", get(pages::products_page))
        .route("/dashboard/products/new", get(pages::new_product_page))
        .route("/dashboard/products/edit/{id}", get(pages::edit_product_page))
        .route("/dashboard/categories", get(pages::categories_page))
        .route("/dashboard/admin", get(pages::admin_page))
        .route("/dashboard/superadmin", get(pages::superadmin_page))
        .route("/dashboard/settings", get(pages::settings_page))
}
