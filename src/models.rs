use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

// --- Roles ---

/// Role
///
/// The three access tiers. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::Superadmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Admin-tier access: `admin` or `superadmin`.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- Core Documents (Mapped to Database) ---

/// User
///
/// Canonical account record from the `users` table. The password hash never leaves
/// the process; responses use `UserProfile`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UserProfile
///
/// Public projection of a `User`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile::from(&user)
    }
}

/// Fields needed to insert a user; the hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Category
///
/// A node in an owner's category tree. `parent_id = None` marks a root.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body returned after a category is removed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDeleteResponse {
    pub message: String,
    /// Direct children moved to the root level.
    pub reparented_children: u64,
}

/// Minimal `{id, name}` reference used when populating parents and product categories.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

/// CategoryView
///
/// A category with its parent populated, as shown in the category table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub id: Uuid,
    pub name: String,
    pub user_id: Uuid,
    pub parent: Option<CategoryRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product
///
/// A catalog entry owned by one user. `categories` holds category ids.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub sku: String,
    pub stock_quantity: i32,
    pub user_id: Uuid,
    pub categories: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `{id, name, email}` reference to the owning account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct OwnerRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for OwnerRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// ProductView
///
/// A product with categories and owner populated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub sku: String,
    pub stock_quantity: i32,
    pub categories: Vec<CategoryRef>,
    pub owner: Option<OwnerRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(product: Product, categories: Vec<CategoryRef>, owner: Option<OwnerRef>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            sku: product.sku,
            stock_quantity: product.stock_quantity,
            categories,
            owner,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// --- Orders ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct OrderItem {
    pub name: String,
    pub qty: i32,
    #[serde(default)]
    pub image: String,
    pub price: f64,
    /// Id of the ordered product.
    pub product: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

/// Payment provider receipt recorded when an order is paid.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    pub update_time: String,
    pub email_address: String,
}

/// Order
///
/// Items, address and payment receipt are embedded documents (JSONB columns).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(json)]
    pub order_items: Vec<OrderItem>,
    #[sqlx(json)]
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    // Column holds JSON `null` until the order is paid.
    #[sqlx(json)]
    pub payment_result: Option<PaymentResult>,
    pub total_price: f64,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order with its purchaser populated (admin views).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user: Option<OwnerRef>,
}

/// Validated input for inserting an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: f64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Body of `POST /api/auth/register`. Every account starts as `user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// UpdateUserRequest
///
/// Body of `PATCH /api/users/{id}`. Both fields are required.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
}

/// CategoryRequest
///
/// Body for creating or updating a category. An empty or missing `parent` makes the
/// category a root.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub parent: Option<String>,
}

impl CategoryRequest {
    /// Trimmed, non-empty name and parsed parent id.
    pub fn validate(&self) -> Result<(String, Option<Uuid>), ApiError> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::bad_request("Category name is required"))?;

        let parent = match self.parent.as_deref().map(str::trim) {
            None | Some("") | Some("null") => None,
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map_err(|_| ApiError::bad_request("Invalid parent category id"))?,
            ),
        };

        Ok((name.to_string(), parent))
    }
}

/// ProductRequest
///
/// Body for creating or replacing a product. Category ids arrive as strings so a
/// malformed id reads as an invalid category rather than a body parse failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub sku: Option<String>,
    pub stock_quantity: Option<i32>,
    pub categories: Option<Vec<String>>,
}

/// Validated product fields, shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub sku: String,
    pub stock_quantity: i32,
    pub categories: Vec<Uuid>,
}

fn required(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ProductRequest {
    pub fn validate(&self) -> Result<ProductInput, ApiError> {
        let missing = || ApiError::bad_request("Missing required fields");

        let name = required(&self.name).ok_or_else(missing)?;
        let description = required(&self.description).ok_or_else(missing)?;
        let sku = required(&self.sku).ok_or_else(missing)?;
        let price = self
            .price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(missing)?;
        let stock_quantity = self.stock_quantity.filter(|q| *q >= 0).ok_or_else(missing)?;
        let raw = self.categories.as_ref().ok_or_else(missing)?;

        if raw.is_empty() {
            return Err(ApiError::bad_request("Categories must be a non-empty array"));
        }

        let mut unique = raw
            .iter()
            .map(|id| Uuid::parse_str(id.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ApiError::bad_request("Invalid categories provided"))?;
        unique.sort();
        unique.dedup();

        Ok(ProductInput {
            name,
            description,
            price,
            sku,
            stock_quantity,
            categories: unique,
        })
    }
}

/// Largest quantity accepted for a single order line.
pub const MAX_ITEM_QTY: i32 = 10_000;

/// CreateOrderRequest
///
/// Body of `POST /api/orders`. Any client-sent `totalPrice` is ignored; the total is
/// recomputed from the items.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<String>,
}

impl CreateOrderRequest {
    pub fn validate(self) -> Result<NewOrder, ApiError> {
        if self.order_items.is_empty() {
            return Err(ApiError::bad_request("No order items"));
        }
        if self
            .order_items
            .iter()
            .any(|item| {
                !(1..=MAX_ITEM_QTY).contains(&item.qty)
                    || !item.price.is_finite()
                    || item.price < 0.0
            })
        {
            return Err(ApiError::bad_request(format!(
                "Order items need a quantity between 1 and {MAX_ITEM_QTY} and a non-negative price"
            )));
        }

        let shipping_address = self
            .shipping_address
            .filter(|a| {
                [&a.address, &a.city, &a.postal_code, &a.country]
                    .iter()
                    .all(|f| !f.trim().is_empty())
            })
            .ok_or_else(|| ApiError::bad_request("Complete shipping address is required"))?;

        let payment_method = required(&self.payment_method)
            .ok_or_else(|| ApiError::bad_request("Payment method is required"))?;

        let total_price = self
            .order_items
            .iter()
            .map(|item| item.price * f64::from(item.qty))
            .sum();

        Ok(NewOrder {
            order_items: self.order_items,
            shipping_address,
            payment_method,
            total_price,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Payer {
    #[serde(default)]
    pub email_address: String,
}

/// PayOrderRequest
///
/// Receipt forwarded by the client after the payment provider confirms.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PayOrderRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub update_time: String,
    #[serde(default)]
    pub payer: Payer,
}

impl From<PayOrderRequest> for PaymentResult {
    fn from(req: PayOrderRequest) -> Self {
        Self {
            id: req.id,
            status: req.status,
            update_time: req.update_time,
            email_address: req.payer.email_address,
        }
    }
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a product image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "front.png")]
    pub filename: String,
    /// The MIME type the upload is constrained to. Must be `image/*`.
    #[schema(example = "image/png")]
    pub file_type: String,
}

/// PresignedUrlResponse
///
/// The time-limited PUT URL and the object key to store on the product/order item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    pub resource_key: String,
}

// --- Dashboard Views (Output) ---

/// DashboardOverview
///
/// Body of `GET /dashboard`. Admins see global counters; users see their own and get
/// no user statistics.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_count: Option<i64>,
    pub product_count: i64,
    pub order_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_users: Option<Vec<UserProfile>>,
    pub recent_products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct RoleBreakdown {
    pub users: i64,
    pub admins: i64,
    pub superadmins: i64,
    pub total: i64,
}

impl RoleBreakdown {
    pub fn tally<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let mut breakdown = RoleBreakdown::default();
        for role in roles {
            match role {
                Role::User => breakdown.users += 1,
                Role::Admin => breakdown.admins += 1,
                Role::Superadmin => breakdown.superadmins += 1,
            }
            breakdown.total += 1;
        }
        breakdown
    }
}

/// Body of `GET /dashboard/superadmin`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SuperadminOverview {
    pub roles: RoleBreakdown,
    pub product_count: i64,
    pub category_count: i64,
    pub order_count: i64,
}

/// Descriptor for the guest-only login/register forms.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FormPage {
    pub page: String,
    pub fields: Vec<String>,
    pub submit_to: String,
}

/// Data backing the new/edit product forms.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProductFormData {
    pub categories: Vec<CategoryView>,
    pub product: Option<ProductView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(
            "root".parse::<Role>(),
            Err(UnknownRole("root".to_string()))
        );
    }

    #[test]
    fn product_request_rejects_zero_price_but_allows_zero_stock() {
        let base = ProductRequest {
            name: Some("Lamp".into()),
            description: Some("Desk lamp".into()),
            price: Some(0.0),
            sku: Some("L-1".into()),
            stock_quantity: Some(0),
            categories: Some(vec![Uuid::from_u128(1).to_string()]),
        };
        assert!(base.validate().is_err());

        let ok = ProductRequest {
            price: Some(12.5),
            ..base
        };
        let input = ok.validate().unwrap();
        assert_eq!(input.stock_quantity, 0);
    }

    #[test]
    fn product_request_dedups_categories() {
        let c = Uuid::from_u128(7);
        let req = ProductRequest {
            name: Some(" Lamp ".into()),
            description: Some("Desk lamp".into()),
            price: Some(3.0),
            sku: Some("L-1".into()),
            stock_quantity: Some(4),
            categories: Some(vec![c.to_string(), c.to_string()]),
        };
        let input = req.validate().unwrap();
        assert_eq!(input.name, "Lamp");
        assert_eq!(input.categories, vec![c]);
    }

    #[test]
    fn empty_category_list_has_its_own_message() {
        let req = ProductRequest {
            name: Some("Lamp".into()),
            description: Some("Desk lamp".into()),
            price: Some(3.0),
            sku: Some("L-1".into()),
            stock_quantity: Some(4),
            categories: Some(vec![]),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Categories must be a non-empty array");
    }

    #[test]
    fn malformed_category_id_is_an_invalid_category() {
        let req = ProductRequest {
            name: Some("Lamp".into()),
            description: Some("Desk lamp".into()),
            price: Some(3.0),
            sku: Some("L-1".into()),
            stock_quantity: Some(4),
            categories: Some(vec!["not-a-uuid".into()]),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid categories provided");
    }

    #[test]
    fn order_quantity_is_capped() {
        let order = |qty| CreateOrderRequest {
            order_items: vec![OrderItem {
                name: "A".into(),
                qty,
                image: String::new(),
                price: 1.0,
                product: Uuid::from_u128(1),
            }],
            shipping_address: Some(ShippingAddress {
                address: "1 Main St".into(),
                city: "Dublin".into(),
                postal_code: "D01".into(),
                country: "IE".into(),
            }),
            payment_method: Some("PayPal".into()),
        };
        assert!(order(MAX_ITEM_QTY).validate().is_ok());
        assert!(order(MAX_ITEM_QTY + 1).validate().is_err());
        assert!(order(i32::MAX).validate().is_err());
        assert!(order(0).validate().is_err());
    }

    #[test]
    fn order_total_is_computed_from_items() {
        let req = CreateOrderRequest {
            order_items: vec![
                OrderItem {
                    name: "A".into(),
                    qty: 2,
                    image: String::new(),
                    price: 1.5,
                    product: Uuid::from_u128(1),
                },
                OrderItem {
                    name: "B".into(),
                    qty: 1,
                    image: String::new(),
                    price: 4.0,
                    product: Uuid::from_u128(2),
                },
            ],
            shipping_address: Some(ShippingAddress {
                address: "1 Main St".into(),
                city: "Dublin".into(),
                postal_code: "D01".into(),
                country: "IE".into(),
            }),
            payment_method: Some("PayPal".into()),
        };
        let order = req.validate().unwrap();
        assert_eq!(order.total_price, 7.0);
    }

    #[test]
    fn category_request_treats_blank_parent_as_root() {
        let req = CategoryRequest {
            name: Some("  Shoes ".into()),
            parent: Some("".into()),
        };
        assert_eq!(req.validate().unwrap(), ("Shoes".to_string(), None));
    }
}
