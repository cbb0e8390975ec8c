use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::RepoResult,
    models::{
        Category, CategoryRef, CategoryView, NewOrder, NewUser, Order, OrderView, PaymentResult,
        Product, ProductInput, ProductView, Role, User,
    },
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Number of product names returned when a category delete is refused.
pub const CATEGORY_USAGE_SAMPLE: usize = 5;

/// Repository Trait
///
/// The persistence contract. Handlers only see `Arc<dyn Repository>` and stay agnostic
/// of the backing store (Postgres in production, the in-memory store in local runs
/// and tests).
///
/// Parameters named `owner: Option<Uuid>` scope a query to one account's documents;
/// `None` means every owner.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Fails with `RepoError::Duplicate` if the email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    /// Newest first, at most `limit` when given.
    async fn list_users(&self, limit: Option<i64>) -> RepoResult<Vec<User>>;
    async fn update_user(&self, id: Uuid, name: String, role: Role) -> RepoResult<Option<User>>;
    /// Removes the account with its categories and products. Refused with
    /// `RepoError::UserCategoriesInUse` while another account's product references one
    /// of those categories.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool>;
    async fn count_users(&self) -> RepoResult<i64>;
    async fn user_roles(&self) -> RepoResult<Vec<Role>>;

    // --- Categories ---
    /// Sorted by name, parent populated.
    async fn list_categories(&self, owner: Option<Uuid>) -> RepoResult<Vec<CategoryView>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    async fn get_category_view(&self, id: Uuid) -> RepoResult<Option<CategoryView>>;
    /// True if `owner` already has a category named `name` under `parent`, other than `exclude`.
    async fn category_exists(
        &self,
        owner: Uuid,
        name: &str,
        parent: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> RepoResult<bool>;
    async fn create_category(
        &self,
        owner: Uuid,
        name: String,
        parent: Option<Uuid>,
    ) -> RepoResult<Category>;
    async fn update_category(
        &self,
        id: Uuid,
        name: String,
        parent: Option<Uuid>,
    ) -> RepoResult<Option<Category>>;
    /// How many of `ids` exist (restricted to `owner` when given).
    async fn count_categories(&self, ids: &[Uuid], owner: Option<Uuid>) -> RepoResult<i64>;
    async fn categories_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<CategoryRef>>;
    /// Re-parents the children of `id` to root and deletes it, atomically.
    /// Returns the number of re-parented children, `None` if the category was missing.
    /// Refused with `RepoError::CategoryInUse` while any product references it; the
    /// check and the delete cannot interleave with a product write.
    async fn delete_category(&self, id: Uuid) -> RepoResult<Option<u64>>;
    async fn count_all_categories(&self) -> RepoResult<i64>;

    // --- Products ---
    /// Newest first, categories and owner populated.
    async fn list_products(&self, owner: Option<Uuid>) -> RepoResult<Vec<ProductView>>;
    async fn recent_products(&self, owner: Option<Uuid>, limit: i64) -> RepoResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>>;
    async fn sku_exists(&self, owner: Uuid, sku: &str, exclude: Option<Uuid>) -> RepoResult<bool>;
    /// Product writes fail with `RepoError::MissingCategories` if a referenced category
    /// is gone by the time the row is written.
    async fn create_product(&self, owner: Uuid, input: ProductInput) -> RepoResult<Product>;
    async fn update_product(&self, id: Uuid, input: ProductInput) -> RepoResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> RepoResult<bool>;
    async fn count_products(&self, owner: Option<Uuid>) -> RepoResult<i64>;

    // --- Orders ---
    /// Inserts the order and decrements stock of each referenced product, atomically.
    /// Stock saturates at `i32::MIN` instead of overflowing.
    async fn create_order(&self, user_id: Uuid, order: NewOrder) -> RepoResult<Order>;
    /// Newest first, purchaser populated.
    async fn list_orders(&self, owner: Option<Uuid>) -> RepoResult<Vec<OrderView>>;
    async fn get_order(&self, id: Uuid) -> RepoResult<Option<OrderView>>;
    async fn mark_order_paid(
        &self,
        id: Uuid,
        payment: PaymentResult,
    ) -> RepoResult<Option<Order>>;
    async fn mark_order_delivered(&self, id: Uuid) -> RepoResult<Option<Order>>;
    async fn count_orders(&self, owner: Option<Uuid>) -> RepoResult<i64>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
