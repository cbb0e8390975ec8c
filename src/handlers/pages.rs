use axum::{
    Json,
    extract::{Path, State},
    response::Redirect,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::ApiError,
    handlers::products::{load_accessible, populate},
    models::{
        CategoryView, DashboardOverview, FormPage, ProductFormData, ProductView, RoleBreakdown,
        SuperadminOverview, UserProfile,
    },
};

/// Number of users and products shown on the overview page.
const RECENT_LIMIT: i64 = 5;

fn form(page: &str, fields: &[&str], submit_to: &str) -> FormPage {
    FormPage {
        page: page.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
        submit_to: submit_to.to_string(),
    }
}

pub async fn root() -> Redirect {
    Redirect::temporary("/login")
}

#[utoipa::path(get, path = "/login", responses((status = 200, description = "Page data", body = FormPage)))]
pub async fn login_page() -> Json<FormPage> {
    Json(form("login", &["email", "password"], "/api/auth/login"))
}

#[utoipa::path(get, path = "/register", responses((status = 200, description = "Page data", body = FormPage)))]
pub async fn register_page() -> Json<FormPage> {
    Json(form(
        "register",
        &["name", "email", "password"],
        "/api/auth/register",
    ))
}

/// dashboard
///
/// Overview counters. Admins get global numbers plus the newest accounts; plain users
/// get their own products and orders only.
#[utoipa::path(get, path = "/dashboard", responses((status = 200, description = "Page data", body = DashboardOverview)))]
pub async fn dashboard(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardOverview>, ApiError> {
    let scope = user.scope();
    let product_count = state.repo.count_products(scope).await?;
    let order_count = state.repo.count_orders(scope).await?;
    let recent_products = state.repo.recent_products(scope, RECENT_LIMIT).await?;

    let (user_count, recent_users) = if user.role.is_admin() {
        let count = state.repo.count_users().await?;
        let recent = state.repo.list_users(Some(RECENT_LIMIT)).await?;
        (
            Some(count),
            Some(recent.into_iter().map(UserProfile::from).collect()),
        )
    } else {
        (None, None)
    };

    Ok(Json(DashboardOverview {
        user_count,
        product_count,
        order_count,
        recent_users,
        recent_products,
    }))
}

#[utoipa::path(get, path = "/dashboard/products", responses((status = 200, description = "Page data", body = [ProductView])))]
pub async fn products_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.repo.list_products(user.scope()).await?))
}

#[utoipa::path(get, path = "/dashboard/products/new", responses((status = 200, description = "Page data", body = ProductFormData)))]
pub async fn new_product_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProductFormData>, ApiError> {
    user.require_admin()?;
    // New products may only use the caller's own categories.
    let categories = state.repo.list_categories(Some(user.id)).await?;
    Ok(Json(ProductFormData {
        categories,
        product: None,
    }))
}

#[utoipa::path(
    get,
    path = "/dashboard/products/edit/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses((status = 200, description = "Page data", body = ProductFormData))
)]
pub async fn edit_product_page(
    user: AuthUser,
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<ProductFormData>, ApiError> {
    user.require_admin()?;
    let product = load_accessible(&state, &user, id).await?;
    let categories = state.repo.list_categories(user.scope()).await?;
    Ok(Json(ProductFormData {
        categories,
        product: Some(populate(&state, product).await?),
    }))
}

#[utoipa::path(get, path = "/dashboard/categories", responses((status = 200, description = "Page data", body = [CategoryView])))]
pub async fn categories_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryView>>, ApiError> {
    user.require_admin()?;
    Ok(Json(state.repo.list_categories(user.scope()).await?))
}

#[utoipa::path(get, path = "/dashboard/admin", responses((status = 200, description = "Page data", body = [UserProfile])))]
pub async fn admin_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    user.require_superadmin()?;
    let users = state.repo.list_users(None).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// superadmin_page
///
/// Account totals per role and global document counts.
#[utoipa::path(get, path = "/dashboard/superadmin", responses((status = 200, description = "Page data", body = SuperadminOverview)))]
pub async fn superadmin_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SuperadminOverview>, ApiError> {
    user.require_superadmin()?;
    let roles = state.repo.user_roles().await?;
    Ok(Json(SuperadminOverview {
        roles: RoleBreakdown::tally(&roles),
        product_count: state.repo.count_products(None).await?,
        category_count: state.repo.count_all_categories().await?,
        order_count: state.repo.count_orders(None).await?,
    }))
}

#[utoipa::path(get, path = "/dashboard/settings", responses((status = 200, description = "Page data", body = UserProfile)))]
pub async fn settings_page(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let stored = state
        .repo
        .find_user_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(UserProfile::from(stored)))
}
