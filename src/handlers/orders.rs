use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, MessageResponse},
    models::{CreateOrderRequest, Order, OrderView, PayOrderRequest},
};

fn order_not_found() -> ApiError {
    ApiError::NotFound("Order not found".to_string())
}

async fn load_accessible(state: &AppState, user: &AuthUser, id: Uuid) -> Result<OrderView, ApiError> {
    let order = state.repo.get_order(id).await?.ok_or_else(order_not_found)?;
    if !user.can_access(order.order.user_id) {
        return Err(ApiError::forbidden());
    }
    Ok(order)
}

/// create_order
///
/// [Authenticated Route] Places an order for the caller. The total is recomputed from
/// the items and stock is decremented in the same transaction.
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Created", body = Order),
        (status = 400, description = "Invalid order", body = MessageResponse)
    )
)]
pub async fn create_order(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateOrderRequest>, ApiError>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let new_order = payload.validate()?;
    let order = state.repo.create_order(user.id, new_order).await?;
    tracing::info!(order_id = %order.id, user_id = %user.id, total = order.total_price, "order placed");
    Ok((StatusCode::CREATED, Json(order)))
}

/// list_orders
///
/// [Admin Route] Every order, newest first, with the purchaser populated.
#[utoipa::path(
    get,
    path = "/api/orders",
    responses(
        (status = 200, description = "All orders", body = [OrderView]),
        (status = 403, description = "Not an admin", body = MessageResponse)
    )
)]
pub async fn list_orders(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.repo.list_orders(None).await?))
}

/// my_orders
#[utoipa::path(
    get,
    path = "/api/orders/my-orders",
    responses((status = 200, description = "Caller's orders", body = [OrderView]))
)]
pub async fn my_orders(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    Ok(Json(state.repo.list_orders(Some(user.id)).await?))
}

/// get_order
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Found", body = OrderView),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn get_order(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(load_accessible(&state, &user, id).await?))
}

/// pay_order
///
/// [Authenticated Route] Records the payment provider's receipt.
#[utoipa::path(
    put,
    path = "/api/orders/{id}/pay",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = PayOrderRequest,
    responses(
        (status = 200, description = "Paid", body = Order),
        (status = 403, description = "Not Owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn pay_order(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(payload), _): WithRejection<Json<PayOrderRequest>, ApiError>,
) -> Result<Json<Order>, ApiError> {
    load_accessible(&state, &user, id).await?;
    let order = state
        .repo
        .mark_order_paid(id, payload.into())
        .await?
        .ok_or_else(order_not_found)?;
    tracing::info!(order_id = %id, "order paid");
    Ok(Json(order))
}

/// deliver_order
///
/// [Admin Route] Marks an order as delivered.
#[utoipa::path(
    put,
    path = "/api/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Delivered", body = Order),
        (status = 403, description = "Not an admin", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    )
)]
pub async fn deliver_order(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<Order>, ApiError> {
    user.require_admin()?;
    let order = state
        .repo
        .mark_order_delivered(id)
        .await?
        .ok_or_else(order_not_found)?;
    Ok(Json(order))
}
