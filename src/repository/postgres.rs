use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, PgPool, types::Json};
use uuid::Uuid;

use super::{CATEGORY_USAGE_SAMPLE, Repository};
use crate::{
    error::{CategoryUsage, RepoError, RepoResult},
    models::{
        Category, CategoryRef, CategoryView, NewOrder, NewUser, Order, OrderView, OwnerRef,
        PaymentResult, Product, ProductInput, ProductView, Role, User,
    },
};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, user_id, parent_id, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, name, description, price, sku, stock_quantity, user_id, categories, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, order_items, shipping_address, payment_method, \
     payment_result, total_price, is_paid, paid_at, is_delivered, delivered_at, created_at, updated_at";

/// PostgresRepository
///
/// The production implementation of `Repository`. Embedded documents (order items,
/// shipping address, payment receipt) live in JSONB columns and product categories in a
/// `UUID[]` column, so each document is still read and written as one row.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-index violation to `RepoError::Duplicate(what)`.
fn unique_violation(
    op: &'static str,
    what: &'static str,
) -> impl FnOnce(sqlx::Error) -> RepoError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Duplicate(what.to_string())
        }
        _ => RepoError::Database { op, source: e },
    }
}

/// Products referencing any of `ids`, newest first, skipping those of `except_owner`.
async fn products_using(
    conn: &mut PgConnection,
    op: &'static str,
    ids: &[Uuid],
    except_owner: Option<Uuid>,
) -> RepoResult<CategoryUsage> {
    let product_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products \
         WHERE categories && $1 AND ($2::uuid IS NULL OR user_id <> $2)",
    )
    .bind(ids.to_vec())
    .bind(except_owner)
    .fetch_one(&mut *conn)
    .await
    .map_err(RepoError::database(op))?;

    let product_names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM products \
         WHERE categories && $1 AND ($2::uuid IS NULL OR user_id <> $2) \
         ORDER BY created_at DESC LIMIT $3",
    )
    .bind(ids.to_vec())
    .bind(except_owner)
    .bind(CATEGORY_USAGE_SAMPLE as i64)
    .fetch_all(&mut *conn)
    .await
    .map_err(RepoError::database(op))?;

    Ok(CategoryUsage {
        product_count,
        product_names,
        total_products: product_count,
    })
}

/// Takes share locks on the referenced categories for the rest of the transaction, so a
/// concurrent `delete_category` either sees this product or runs first and makes the
/// write fail.
async fn lock_categories(
    conn: &mut PgConnection,
    op: &'static str,
    ids: &[Uuid],
) -> RepoResult<()> {
    let locked: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM categories WHERE id = ANY($1) FOR SHARE")
            .bind(ids.to_vec())
            .fetch_all(&mut *conn)
            .await
            .map_err(RepoError::database(op))?;
    if ids.iter().any(|id| !locked.contains(id)) {
        return Err(RepoError::MissingCategories);
    }
    Ok(())
}

#[derive(FromRow)]
struct CategoryViewRow {
    id: Uuid,
    name: String,
    user_id: Uuid,
    parent_id: Option<Uuid>,
    parent_name: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<CategoryViewRow> for CategoryView {
    fn from(row: CategoryViewRow) -> Self {
        let parent = match (row.parent_id, row.parent_name) {
            (Some(id), Some(name)) => Some(CategoryRef { id, name }),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            user_id: row.user_id,
            parent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProductViewRow {
    #[sqlx(flatten)]
    product: Product,
    owner_name: Option<String>,
    owner_email: Option<String>,
    #[sqlx(json)]
    category_refs: Vec<CategoryRef>,
}

impl From<ProductViewRow> for ProductView {
    fn from(row: ProductViewRow) -> Self {
        let owner = match (row.owner_name, row.owner_email) {
            (Some(name), Some(email)) => Some(OwnerRef {
                id: row.product.user_id,
                name,
                email,
            }),
            _ => None,
        };
        ProductView::new(row.product, row.category_refs, owner)
    }
}

#[derive(FromRow)]
struct OrderViewRow {
    #[sqlx(flatten)]
    order: Order,
    user_name: Option<String>,
    user_email: Option<String>,
}

impl From<OrderViewRow> for OrderView {
    fn from(row: OrderViewRow) -> Self {
        let user = match (row.user_name, row.user_email) {
            (Some(name), Some(email)) => Some(OwnerRef {
                id: row.order.user_id,
                name,
                email,
            }),
            _ => None,
        };
        OrderView {
            order: row.order,
            user,
        }
    }
}

const CATEGORY_VIEW_SELECT: &str = r#"
    SELECT c.id, c.name, c.user_id, c.parent_id, p.name AS parent_name, c.created_at, c.updated_at
    FROM categories c
    LEFT JOIN categories p ON p.id = c.parent_id
"#;

const ORDER_VIEW_SELECT: &str = r#"
    SELECT o.id, o.user_id, o.order_items, o.shipping_address, o.payment_method,
           o.payment_result, o.total_price, o.is_paid, o.paid_at, o.is_delivered,
           o.delivered_at, o.created_at, o.updated_at,
           u.name AS user_name, u.email AS user_email
    FROM orders o
    LEFT JOIN users u ON u.id = o.user_id
"#;

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn find_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("find_user_by_id"))?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("find_user_by_email"))?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("create_user", "User already registered"))
    }

    async fn list_users(&self, limit: Option<i64>) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::database("list_users"))?;
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, name: String, role: Role) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, role = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("update_user"))?;
        Ok(user)
    }

    /// delete_user
    ///
    /// The cascade would drop the account's categories, so they are locked and checked
    /// for foreign references in the same transaction first.
    async fn delete_user(&self, id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await.map_err(RepoError::database("delete_user"))?;

        let owned: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM categories WHERE user_id = $1 FOR UPDATE")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(RepoError::database("delete_user"))?;
        if !owned.is_empty() {
            let usage = products_using(&mut tx, "delete_user", &owned, Some(id)).await?;
            if usage.product_count > 0 {
                return Err(RepoError::UserCategoriesInUse(usage));
            }
        }

        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::database("delete_user"))?;
        tx.commit().await.map_err(RepoError::database("delete_user"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(RepoError::database("count_users"))?;
        Ok(count)
    }

    async fn user_roles(&self) -> RepoResult<Vec<Role>> {
        let raw: Vec<String> = sqlx::query_scalar("SELECT role FROM users")
            .fetch_all(&self.pool)
            .await
            .map_err(RepoError::database("user_roles"))?;
        Ok(raw
            .into_iter()
            .filter_map(|r| match r.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping user with unknown role");
                    None
                }
            })
            .collect())
    }

    // --- CATEGORIES ---

    async fn list_categories(&self, owner: Option<Uuid>) -> RepoResult<Vec<CategoryView>> {
        let rows = sqlx::query_as::<_, CategoryViewRow>(&format!(
            "{CATEGORY_VIEW_SELECT} WHERE ($1::uuid IS NULL OR c.user_id = $1) ORDER BY c.name ASC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::database("list_categories"))?;
        Ok(rows.into_iter().map(CategoryView::from).collect())
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("get_category"))?;
        Ok(category)
    }

    async fn get_category_view(&self, id: Uuid) -> RepoResult<Option<CategoryView>> {
        let row = sqlx::query_as::<_, CategoryViewRow>(&format!(
            "{CATEGORY_VIEW_SELECT} WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("get_category_view"))?;
        Ok(row.map(CategoryView::from))
    }

    async fn category_exists(
        &self,
        owner: Uuid,
        name: &str,
        parent: Option<Uuid>,
        exclude: Option<Uuid>,
    ) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM categories
                WHERE user_id = $1
                  AND name = $2
                  AND parent_id IS NOT DISTINCT FROM $3
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(owner)
        .bind(name)
        .bind(parent)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::database("category_exists"))?;
        Ok(exists)
    }

    async fn create_category(
        &self,
        owner: Uuid,
        name: String,
        parent: Option<Uuid>,
    ) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (id, name, user_id, parent_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner)
        .bind(parent)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("create_category", "Category already exists"))
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: String,
        parent: Option<Uuid>,
    ) -> RepoResult<Option<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET name = $2, parent_id = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(parent)
        .fetch_optional(&self.pool)
        .await
        .map_err(unique_violation("update_category", "Category name already exists"))
    }

    async fn count_categories(&self, ids: &[Uuid], owner: Option<Uuid>) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE id = ANY($1) AND ($2::uuid IS NULL OR user_id = $2)",
        )
        .bind(ids.to_vec())
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::database("count_categories"))?;
        Ok(count)
    }

    async fn categories_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<CategoryRef>> {
        let refs = sqlx::query_as::<_, CategoryRef>(
            "SELECT id, name FROM categories WHERE id = ANY($1) ORDER BY name ASC",
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::database("categories_by_ids"))?;
        Ok(refs)
    }

    /// delete_category
    ///
    /// One transaction. The row lock conflicts with the share lock product writes take
    /// on their categories, so no product can start referencing it between the usage
    /// check and the delete.
    async fn delete_category(&self, id: Uuid) -> RepoResult<Option<u64>> {
        let mut tx = self.pool.begin().await.map_err(RepoError::database("delete_category"))?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RepoError::database("delete_category"))?;
        if locked.is_none() {
            return Ok(None);
        }

        let usage = products_using(&mut tx, "delete_category", &[id], None).await?;
        if usage.product_count > 0 {
            return Err(RepoError::CategoryInUse(usage));
        }

        let reparented = sqlx::query(
            "UPDATE categories SET parent_id = NULL, updated_at = NOW() WHERE parent_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::database("delete_category"))?
        .rows_affected();

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::database("delete_category"))?;

        tx.commit().await.map_err(RepoError::database("delete_category"))?;
        Ok(Some(reparented))
    }

    async fn count_all_categories(&self) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await
            .map_err(RepoError::database("count_all_categories"))?;
        Ok(count)
    }

    // --- PRODUCTS ---

    async fn list_products(&self, owner: Option<Uuid>) -> RepoResult<Vec<ProductView>> {
        let rows = sqlx::query_as::<_, ProductViewRow>(
            r#"
            SELECT p.id, p.name, p.description, p.price, p.sku, p.stock_quantity, p.user_id,
                   p.categories, p.created_at, p.updated_at,
                   u.name AS owner_name, u.email AS owner_email,
                   COALESCE(
                       (SELECT jsonb_agg(jsonb_build_object('id', c.id, 'name', c.name) ORDER BY c.name)
                        FROM categories c WHERE c.id = ANY(p.categories)),
                       '[]'::jsonb
                   ) AS category_refs
            FROM products p
            LEFT JOIN users u ON u.id = p.user_id
            WHERE ($1::uuid IS NULL OR p.user_id = $1)
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::database("list_products"))?;
        Ok(rows.into_iter().map(ProductView::from).collect())
    }

    async fn recent_products(&self, owner: Option<Uuid>, limit: i64) -> RepoResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::database("recent_products"))?;
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> RepoResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("get_product"))?;
        Ok(product)
    }

    async fn sku_exists(&self, owner: Uuid, sku: &str, exclude: Option<Uuid>) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM products WHERE user_id = $1 AND sku = $2 \
             AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(owner)
        .bind(sku)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::database("sku_exists"))?;
        Ok(exists)
    }

    async fn create_product(&self, owner: Uuid, input: ProductInput) -> RepoResult<Product> {
        let mut tx = self.pool.begin().await.map_err(RepoError::database("create_product"))?;
        lock_categories(&mut tx, "create_product", &input.categories).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (id, name, description, price, sku, stock_quantity, user_id, \
             categories, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(input.name)
        .bind(input.description)
        .bind(input.price)
        .bind(input.sku)
        .bind(input.stock_quantity)
        .bind(owner)
        .bind(input.categories)
        .fetch_one(&mut *tx)
        .await
        .map_err(unique_violation("create_product", "SKU already exists"))?;

        tx.commit().await.map_err(RepoError::database("create_product"))?;
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, input: ProductInput) -> RepoResult<Option<Product>> {
        let mut tx = self.pool.begin().await.map_err(RepoError::database("update_product"))?;
        lock_categories(&mut tx, "update_product", &input.categories).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET name = $2, description = $3, price = $4, sku = $5, \
             stock_quantity = $6, categories = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name)
        .bind(input.description)
        .bind(input.price)
        .bind(input.sku)
        .bind(input.stock_quantity)
        .bind(input.categories)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unique_violation("update_product", "SKU already exists"))?;

        tx.commit().await.map_err(RepoError::database("update_product"))?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepoError::database("delete_product"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_products(&self, owner: Option<Uuid>) -> RepoResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE ($1::uuid IS NULL OR user_id = $1)")
                .bind(owner)
                .fetch_one(&self.pool)
                .await
                .map_err(RepoError::database("count_products"))?;
        Ok(count)
    }

    // --- ORDERS ---

    /// create_order
    ///
    /// Inserts the order and decrements stock in one transaction. Items whose product
    /// no longer exists are kept on the order but touch no stock. The subtraction runs
    /// in `bigint` and is clamped to the `integer` range.
    async fn create_order(&self, user_id: Uuid, order: NewOrder) -> RepoResult<Order> {
        let mut tx = self.pool.begin().await.map_err(RepoError::database("create_order"))?;

        let created = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (id, user_id, order_items, shipping_address, payment_method, \
             payment_result, total_price, is_paid, is_delivered, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'null'::jsonb, $6, FALSE, FALSE, NOW(), NOW()) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(Json(&order.order_items))
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(order.total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(RepoError::database("create_order"))?;

        for item in &order.order_items {
            sqlx::query(
                "UPDATE products \
                 SET stock_quantity = GREATEST(stock_quantity::bigint - $2, -2147483648)::integer, \
                     updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(item.product)
            .bind(i64::from(item.qty))
            .execute(&mut *tx)
            .await
            .map_err(RepoError::database("create_order"))?;
        }

        tx.commit().await.map_err(RepoError::database("create_order"))?;
        Ok(created)
    }

    async fn list_orders(&self, owner: Option<Uuid>) -> RepoResult<Vec<OrderView>> {
        let rows = sqlx::query_as::<_, OrderViewRow>(&format!(
            "{ORDER_VIEW_SELECT} WHERE ($1::uuid IS NULL OR o.user_id = $1) ORDER BY o.created_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::database("list_orders"))?;
        Ok(rows.into_iter().map(OrderView::from).collect())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<OrderView>> {
        let row = sqlx::query_as::<_, OrderViewRow>(&format!("{ORDER_VIEW_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::database("get_order"))?;
        Ok(row.map(OrderView::from))
    }

    async fn mark_order_paid(
        &self,
        id: Uuid,
        payment: PaymentResult,
    ) -> RepoResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET is_paid = TRUE, paid_at = NOW(), payment_result = $2, \
             updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(Json(Some(payment)))
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("mark_order_paid"))?;
        Ok(order)
    }

    async fn mark_order_delivered(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET is_delivered = TRUE, delivered_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::database("mark_order_delivered"))?;
        Ok(order)
    }

    async fn count_orders(&self, owner: Option<Uuid>) -> RepoResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::uuid IS NULL OR user_id = $1)")
                .bind(owner)
                .fetch_one(&self.pool)
                .await
                .map_err(RepoError::database("count_orders"))?;
        Ok(count)
    }
}
