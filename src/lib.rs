use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod repository;
pub mod storage;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, pages, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, RepoError};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and `ToSchema`
/// models. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register, handlers::auth::login, handlers::auth::logout,
        handlers::auth::me,
        handlers::users::list_users, handlers::users::update_user, handlers::users::delete_user,
        handlers::categories::list_categories, handlers::categories::create_category,
        handlers::categories::get_category, handlers::categories::update_category,
        handlers::categories::delete_category,
        handlers::products::list_products, handlers::products::create_product,
        handlers::products::get_product, handlers::products::update_product,
        handlers::products::delete_product,
        handlers::orders::create_order, handlers::orders::list_orders, handlers::orders::my_orders,
        handlers::orders::get_order, handlers::orders::pay_order, handlers::orders::deliver_order,
        handlers::uploads::get_presigned_url,
        handlers::pages::login_page, handlers::pages::register_page, handlers::pages::dashboard,
        handlers::pages::products_page, handlers::pages::new_product_page,
        handlers::pages::edit_product_page, handlers::pages::categories_page,
        handlers::pages::admin_page, handlers::pages::superadmin_page,
        handlers::pages::settings_page
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::RegisterRequest, models::LoginRequest,
            models::LoginResponse, models::UpdateUserRequest,
            models::Category, models::CategoryRef, models::CategoryView, models::CategoryRequest,
            models::CategoryDeleteResponse,
            models::Product, models::ProductView, models::ProductRequest, models::OwnerRef,
            models::Order, models::OrderView, models::OrderItem, models::ShippingAddress,
            models::PaymentResult, models::CreateOrderRequest, models::PayOrderRequest,
            models::Payer, models::PresignedUrlRequest, models::PresignedUrlResponse,
            models::DashboardOverview, models::RoleBreakdown, models::SuperadminOverview,
            models::FormPage, models::ProductFormData,
            error::MessageResponse, error::CategoryUsage,
        )
    ),
    tags(
        (name = "shop-dashboard", description = "Multi-tenant catalog and order dashboard API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, cloneable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, the in-memory store in tests.
    pub repo: RepositoryState,
    /// Object storage used for product image uploads.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer for the authenticated and admin routers. A failed `AuthUser`
/// extraction rejects the request with 401 before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles every router, the page guard and the observability layers, and binds
/// the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(pages::page_routes())
        // The page guard sees every request but only acts on dashboard paths.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            permissions::page_guard,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// One span per request, tagged with the `x-request-id` set by `SetRequestIdLayer`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
