use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CATEGORY_USAGE_SAMPLE, Repository};
use crate::{
    error::{CategoryUsage, RepoError, RepoResult},
    models::{
        Category, CategoryRef, CategoryView, NewOrder, NewUser, Order, OrderView, OwnerRef,
        PaymentResult, Product, ProductInput, ProductView, Role, User,
    },
};

#[derive(Default)]
struct Store {
    users: Vec<User>,
    categories: Vec<Category>,
    products: Vec<Product>,
    orders: Vec<Order>,
}

impl Store {
    fn owner_ref(&self, id: Uuid) -> Option<OwnerRef> {
        self.users.iter().find(|u| u.id == id).map(OwnerRef::from)
    }

    fn category_view(&self, category: &Category) -> CategoryView {
        let parent = category.parent_id.and_then(|pid| {
            self.categories
                .iter()
                .find(|c| c.id == pid)
                .map(|p| CategoryRef {
                    id: p.id,
                    name: p.name.clone(),
                })
        });
        CategoryView {
            id: category.id,
            name: category.name.clone(),
            user_id: category.user_id,
            parent,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }

    fn category_refs(&self, ids: &[Uuid]) -> Vec<CategoryRef> {
        let mut refs: Vec<CategoryRef> = self
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id))
            .map(|c| CategoryRef {
                id: c.id,
                name: c.name.clone(),
            })
            .collect();
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        refs
    }

    fn order_view(&self, order: &Order) -> OrderView {
        OrderView {
            order: order.clone(),
            user: self.owner_ref(order.user_id),
        }
    }

    fn duplicate_category(
        &self,
        owner: Uuid,
        name: &str,
        parent: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> bool {
        self.categories.iter().any(|c| {
            c.user_id == owner && c.name == name && c.parent_id == parent && Some(c.id) != exclude
        })
    }

    /// Products referencing any of `ids`, newest first, skipping those of `except_owner`.
    fn usage(&self, ids: &[Uuid], except_owner: Option<Uuid>) -> CategoryUsage {
        let using: Vec<Product> = newest_first(&self.products, |p| p.created_at)
            .into_iter()
            .filter(|p| Some(p.user_id) != except_owner)
            .filter(|p| p.categories.iter().any(|c| ids.contains(c)))
            .collect();
        let product_count = using.len() as i64;
        CategoryUsage {
            product_count,
            product_names: using
                .into_iter()
                .take(CATEGORY_USAGE_SAMPLE)
                .map(|p| p.name)
                .collect(),
            total_products: product_count,
        }
    }

    fn categories_exist(&self, ids: &[Uuid]) -> bool {
        ids.iter().all(|id| self.categories.iter().any(|c| c.id == *id))
    }

    fn duplicate_sku(&self, owner: Uuid, sku: &str, exclude: Option<Uuid>) -> bool {
        self.products
            .iter()
            .any(|p| p.user_id == owner && p.sku == sku && Some(p.id) != exclude)
    }
}

/// Newest first. For equal timestamps the later insert wins.
fn newest_first<T: Clone>(items: &[T], created: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = items.iter().rev().cloned().collect();
    out.sort_by(|a, b| created(b).cmp(&created(a)));
    out
}

/// InMemoryRepository
///
/// A document store held behind a `tokio::sync::RwLock`. It enforces the same
/// uniqueness rules and cascades as the Postgres schema, which makes it a faithful
/// stand-in for local development and for the integration tests.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Duplicate("User already registered".to_string()));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self, limit: Option<i64>) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        let mut users = newest_first(&store.users, |u| u.created_at);
        if let Some(limit) = limit {
            users.truncate(limit.max(0) as usize);
        }
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, name: String, role: Role) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.name = name;
            u.role = role;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    /// Mirrors `ON DELETE CASCADE` on categories and products; orders are kept.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if !store.users.iter().any(|u| u.id == id) {
            return Ok(false);
        }

        let owned: Vec<Uuid> = store
            .categories
            .iter()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        let usage = store.usage(&owned, Some(id));
        if usage.product_count > 0 {
            return Err(RepoError::UserCategoriesInUse(usage));
        }

        store.users.retain(|u| u.id != id);
        let removed: HashSet<Uuid> = owned.into_iter().collect();
        store.categories.retain(|c| c.user_id != id);
        for category in store.categories.iter_mut() {
            if category.parent_id.is_some_and(|p| removed.contains(&p)) {
                category.parent_id = None;
            }
        }
        store.products.retain(|p| p.user_id != id);
        Ok(true)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let store = self.store.read().await;
        Ok(store.users.len() as i64)
    }

    async fn user_roles(&self) -> RepoResult<Vec<Role>> {
        let store = self.store.read().await;
        Ok(store.users.iter().map(|u| u.role).collect())
    }

    // --- CATEGORIES ---

    async fn list_categories(&self, owner: Option<Uuid>) -> RepoResult<Vec<CategoryView>> {
        let store = self.store.read().await;
        let mut views: Vec<CategoryView> = store
            .categories
            .iter()
            .filter(|c| owner.is_none_or(|o| c.user_id == o))
            .map(|c| store.category_view(c))
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(views)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let store = self.store.read().await;
        Ok(store.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn get_category_view(&self, id: Uuid) -> RepoResult<Option<CategoryView>> {
        let store = self.store.read().await;
        Ok(store
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| store.category_view(c)))
    }

    async fn category_exists(
        &self,
        owner: Uuid,
        name: &str,
        parent: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> RepoResult<bool> {
        let store = self.store.read().await;
        Ok(store.duplicate_category(owner, name, parent, exclude))
    }

    async fn create_category(
        &self,
        owner: Uuid,
        name: String,
        parent: Option<Uuid>,
    ) -> RepoResult<Category> {
        let mut store = self.store.write().await;
        if store.duplicate_category(owner, &name, parent, None) {
            return Err(RepoError::Duplicate("Category already exists".to_string()));
        }
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name,
            user_id: owner,
            parent_id: parent,
            created_at: now,
            updated_at: now,
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: String,
        parent: Option<Uuid>,
    ) -> RepoResult<Option<Category>> {
        let mut store = self.store.write().await;
        let Some(owner) = store.categories.iter().find(|c| c.id == id).map(|c| c.user_id) else {
            return Ok(None);
        };
        if store.duplicate_category(owner, &name, parent, Some(id)) {
            return Err(RepoError::Duplicate("Category name already exists".to_string()));
        }
        Ok(store.categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = name;
            c.parent_id = parent;
            c.updated_at = Utc::now();
            c.clone()
        }))
    }

    async fn count_categories(&self, ids: &[Uuid], owner: Option<Uuid>) -> RepoResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .categories
            .iter()
            .filter(|c| ids.contains(&c.id) && owner.is_none_or(|o| c.user_id == o))
            .count() as i64)
    }

    async fn categories_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<CategoryRef>> {
        let store = self.store.read().await;
        Ok(store.category_refs(ids))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<Option<u64>> {
        let mut store = self.store.write().await;
        if !store.categories.iter().any(|c| c.id == id) {
            return Ok(None);
        }
        let usage = store.usage(&[id], None);
        if usage.product_count > 0 {
            return Err(RepoError::CategoryInUse(usage));
        }
        let now = Utc::now();
        let mut reparented = 0;
        for child in store.categories.iter_mut().filter(|c| c.parent_id == Some(id)) {
            child.parent_id = None;
            child.updated_at = now;
            reparented += 1;
        }
        store.categories.retain(|c| c.id != id);
        Ok(Some(reparented))
    }

    async fn count_all_categories(&self) -> RepoResult<i64> {
        let store = self.store.read().await;
        Ok(store.categories.len() as i64)
    }

    // --- PRODUCTS ---

    async fn list_products(&self, owner: Option<Uuid>) -> RepoResult<Vec<ProductView>> {
        let store = self.store.read().await;
        Ok(newest_first(&store.products, |p| p.created_at)
            .into_iter()
            .filter(|p| owner.is_none_or(|o| p.user_id == o))
            .map(|p| {
                let categories = store.category_refs(&p.categories);
                let owner = store.owner_ref(p.user_id);
                ProductView::new(p, categories, owner)
            })
            .collect())
    }

    async fn recent_products(&self, owner: Option<Uuid>, limit: i64) -> RepoResult<Vec<Product>> {
        let store = self.store.read().await;
        Ok(newest_first(&store.products, |p| p.created_at)
            .into_iter()
            .filter(|p| owner.is_none_or(|o| p.user_id == o))
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let store = self.store.read().await;
        Ok(store.products.iter().find(|p| p.id == id).cloned())
    }

    async fn sku_exists(&self, owner: Uuid, sku: &str, exclude: Option<Uuid>) -> RepoResult<bool> {
        let store = self.store.read().await;
        Ok(store.duplicate_sku(owner, sku, exclude))
    }

    async fn create_product(&self, owner: Uuid, input: ProductInput) -> RepoResult<Product> {
        let mut store = self.store.write().await;
        if store.duplicate_sku(owner, &input.sku, None) {
            return Err(RepoError::Duplicate("SKU already exists".to_string()));
        }
        if !store.categories_exist(&input.categories) {
            return Err(RepoError::MissingCategories);
        }
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            price: input.price,
            sku: input.sku,
            stock_quantity: input.stock_quantity,
            user_id: owner,
            categories: input.categories,
            created_at: now,
            updated_at: now,
        };
        store.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, input: ProductInput) -> RepoResult<Option<Product>> {
        let mut store = self.store.write().await;
        let Some(owner) = store.products.iter().find(|p| p.id == id).map(|p| p.user_id) else {
            return Ok(None);
        };
        if store.duplicate_sku(owner, &input.sku, Some(id)) {
            return Err(RepoError::Duplicate("SKU already exists".to_string()));
        }
        if !store.categories_exist(&input.categories) {
            return Err(RepoError::MissingCategories);
        }
        Ok(store.products.iter_mut().find(|p| p.id == id).map(|p| {
            p.name = input.name;
            p.description = input.description;
            p.price = input.price;
            p.sku = input.sku;
            p.stock_quantity = input.stock_quantity;
            p.categories = input.categories;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.products.len();
        store.products.retain(|p| p.id != id);
        Ok(store.products.len() != before)
    }

    async fn count_products(&self, owner: Option<Uuid>) -> RepoResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .products
            .iter()
            .filter(|p| owner.is_none_or(|o| p.user_id == o))
            .count() as i64)
    }

    // --- ORDERS ---

    async fn create_order(&self, user_id: Uuid, order: NewOrder) -> RepoResult<Order> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        for item in &order.order_items {
            if let Some(product) = store.products.iter_mut().find(|p| p.id == item.product) {
                product.stock_quantity = product.stock_quantity.saturating_sub(item.qty);
                product.updated_at = now;
            }
        }
        let created = Order {
            id: Uuid::new_v4(),
            user_id,
            order_items: order.order_items,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            payment_result: None,
            total_price: order.total_price,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };
        store.orders.push(created.clone());
        Ok(created)
    }

    async fn list_orders(&self, owner: Option<Uuid>) -> RepoResult<Vec<OrderView>> {
        let store = self.store.read().await;
        Ok(newest_first(&store.orders, |o| o.created_at)
            .iter()
            .filter(|o| owner.is_none_or(|u| o.user_id == u))
            .map(|o| store.order_view(o))
            .collect())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<OrderView>> {
        let store = self.store.read().await;
        Ok(store
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| store.order_view(o)))
    }

    async fn mark_order_paid(
        &self,
        id: Uuid,
        payment: PaymentResult,
    ) -> RepoResult<Option<Order>> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        Ok(store.orders.iter_mut().find(|o| o.id == id).map(|o| {
            o.is_paid = true;
            o.paid_at = Some(now);
            o.payment_result = Some(payment);
            o.updated_at = now;
            o.clone()
        }))
    }

    async fn mark_order_delivered(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        Ok(store.orders.iter_mut().find(|o| o.id == id).map(|o| {
            o.is_delivered = true;
            o.delivered_at = Some(now);
            o.updated_at = now;
            o.clone()
        }))
    }

    async fn count_orders(&self, owner: Option<Uuid>) -> RepoResult<i64> {
        let store = self.store.read().await;
        Ok(store
            .orders
            .iter()
            .filter(|o| owner.is_none_or(|u| o.user_id == u))
            .count() as i64)
    }
}
