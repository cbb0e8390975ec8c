use crate::{
    AppState,
    handlers::{orders, users},
};
use axum::{
    Router,
    routing::{get, patch, put},
};

/// Admin Router Module
///
/// Account management and fulfilment. Every handler calls `require_admin`, and the
/// superadmin rules for user edits are enforced in `handlers::users`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/{id}",
            patch(users::update_user).delete(users::delete_user),
        )
        .route("/api/orders/{id}/deliver", put(orders::deliver_order))
}
