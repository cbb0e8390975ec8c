use shop_dashboard::{
    error::RepoError,
    models::{
        NewOrder, NewUser, OrderItem, PaymentResult, ProductInput, Role, ShippingAddress, User,
    },
    repository::{PostgresRepository, Repository},
};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the pool of the database named by `DATABASE_URL`.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    /// `None` when no database is configured; the caller skips the test.
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping Postgres repository test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        PostgresRepository::new(pool.clone())
            .migrate()
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

/// Every test works on its own accounts, so runs against a shared database do not collide.
async fn create_test_user(repo: &PostgresRepository, role: Role) -> User {
    repo.create_user(NewUser {
        name: format!("{} tester", role.as_str()),
        email: format!("{}@test.com", Uuid::new_v4()),
        password_hash: "unused".to_string(),
        role,
    })
    .await
    .expect("Failed to create test user")
}

fn product_input(name: &str, sku: &str, stock: i32, categories: Vec<Uuid>) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        description: "Integration product".to_string(),
        price: 9.5,
        sku: sku.to_string(),
        stock_quantity: stock,
        categories,
    }
}

fn new_order(product: Uuid, qty: i32) -> NewOrder {
    NewOrder {
        order_items: vec![OrderItem {
            name: "Item".to_string(),
            qty,
            image: String::new(),
            price: 2.0,
            product,
        }],
        shipping_address: ShippingAddress {
            address: "1 Main St".to_string(),
            city: "Dublin".to_string(),
            postal_code: "D01".to_string(),
            country: "IE".to_string(),
        },
        payment_method: "PayPal".to_string(),
        total_price: 2.0 * f64::from(qty),
    }
}

// --- Tests ---

#[test]
async fn test_user_lookup_and_duplicate_email() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let user = create_test_user(&repo, Role::Admin).await;

    let by_email = repo.find_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_email.role, Role::Admin);

    let dup = repo
        .create_user(NewUser {
            name: "Again".to_string(),
            email: user.email.clone(),
            password_hash: "unused".to_string(),
            role: Role::User,
        })
        .await;
    assert!(matches!(dup, Err(RepoError::Duplicate(_))));
    assert!(repo.count_users().await.unwrap() >= 1);
}

#[test]
async fn test_category_uniqueness_covers_root_categories() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let owner = create_test_user(&repo, Role::User).await;

    let root = repo
        .create_category(owner.id, "Tools".to_string(), None)
        .await
        .unwrap();

    // NULL parents must still collide through the COALESCE index.
    let dup_root = repo.create_category(owner.id, "Tools".to_string(), None).await;
    assert!(matches!(dup_root, Err(RepoError::Duplicate(_))));
    assert!(repo.category_exists(owner.id, "Tools", None, None).await.unwrap());
    assert!(
        !repo
            .category_exists(owner.id, "Tools", None, Some(root.id))
            .await
            .unwrap()
    );

    // The same name under a different parent is a different category.
    let nested = repo
        .create_category(owner.id, "Tools".to_string(), Some(root.id))
        .await
        .unwrap();
    assert!(
        repo.category_exists(owner.id, "Tools", Some(root.id), None)
            .await
            .unwrap()
    );

    let views = repo.list_categories(Some(owner.id)).await.unwrap();
    assert_eq!(views.len(), 2);
    let nested_view = views.iter().find(|v| v.id == nested.id).unwrap();
    assert_eq!(nested_view.parent.as_ref().unwrap().name, "Tools");
}

#[test]
async fn test_product_view_populates_categories_and_owner() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let owner = create_test_user(&repo, Role::Admin).await;
    let zeta = repo
        .create_category(owner.id, "Zeta".to_string(), None)
        .await
        .unwrap();
    let alpha = repo
        .create_category(owner.id, "Alpha".to_string(), None)
        .await
        .unwrap();

    repo.create_product(owner.id, product_input("Lamp", "L-1", 3, vec![zeta.id, alpha.id]))
        .await
        .unwrap();
    let dup = repo
        .create_product(owner.id, product_input("Lamp 2", "L-1", 3, vec![alpha.id]))
        .await;
    assert!(matches!(dup, Err(RepoError::Duplicate(_))));

    let views = repo.list_products(Some(owner.id)).await.unwrap();
    assert_eq!(views.len(), 1);
    let names: Vec<&str> = views[0].categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Zeta"]);
    assert_eq!(views[0].owner.as_ref().unwrap().email, owner.email);
}

#[test]
async fn test_delete_category_checks_usage_and_reparents() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let owner = create_test_user(&repo, Role::Admin).await;
    let parent = repo
        .create_category(owner.id, "Outdoor".to_string(), None)
        .await
        .unwrap();
    let child = repo
        .create_category(owner.id, "Tents".to_string(), Some(parent.id))
        .await
        .unwrap();
    let product = repo
        .create_product(owner.id, product_input("Tent", "T-1", 1, vec![parent.id]))
        .await
        .unwrap();

    match repo.delete_category(parent.id).await {
        Err(RepoError::CategoryInUse(usage)) => {
            assert_eq!(usage.product_count, 1);
            assert_eq!(usage.product_names, vec!["Tent".to_string()]);
        }
        other => panic!("unexpected: {other:?}"),
    }
    let untouched = repo.get_category(child.id).await.unwrap().unwrap();
    assert_eq!(untouched.parent_id, Some(parent.id));

    assert!(repo.delete_product(product.id).await.unwrap());
    assert_eq!(repo.delete_category(parent.id).await.unwrap(), Some(1));
    assert_eq!(repo.delete_category(parent.id).await.unwrap(), None);

    let child_now = repo.get_category(child.id).await.unwrap().unwrap();
    assert_eq!(child_now.parent_id, None);

    let orphan = repo
        .create_product(owner.id, product_input("Tent 2", "T-2", 1, vec![parent.id]))
        .await;
    assert!(matches!(orphan, Err(RepoError::MissingCategories)));
}

#[test]
async fn test_delete_user_refused_while_foreign_products_use_their_categories() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::User).await;
    let admin = create_test_user(&repo, Role::Admin).await;
    let seller_cat = repo
        .create_category(seller.id, "Lamps".to_string(), None)
        .await
        .unwrap();
    let foreign = repo
        .create_product(admin.id, product_input("Borrowed", "B-1", 1, vec![seller_cat.id]))
        .await
        .unwrap();

    let refused = repo.delete_user(seller.id).await;
    assert!(matches!(refused, Err(RepoError::UserCategoriesInUse(_))));
    assert!(repo.find_user_by_id(seller.id).await.unwrap().is_some());

    assert!(repo.delete_product(foreign.id).await.unwrap());
    assert!(repo.delete_user(seller.id).await.unwrap());
    assert!(repo.get_category(seller_cat.id).await.unwrap().is_none());
}

#[test]
async fn test_order_lifecycle_and_stock() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let seller = create_test_user(&repo, Role::Admin).await;
    let buyer = create_test_user(&repo, Role::User).await;
    let cat = repo
        .create_category(seller.id, "Games".to_string(), None)
        .await
        .unwrap();
    let product = repo
        .create_product(seller.id, product_input("Game", "G-1", 10, vec![cat.id]))
        .await
        .unwrap();

    // 1. Unpaid orders read back the JSON `null` receipt as `None`.
    let order = repo.create_order(buyer.id, new_order(product.id, 3)).await.unwrap();
    assert_eq!(order.payment_result, None);
    assert_eq!(order.order_items.len(), 1);
    let stock = repo.get_product(product.id).await.unwrap().unwrap().stock_quantity;
    assert_eq!(stock, 7);

    // 2. Pay and deliver.
    let receipt = PaymentResult {
        id: "PAY-1".to_string(),
        status: "COMPLETED".to_string(),
        update_time: "2026-01-01T00:00:00Z".to_string(),
        email_address: buyer.email.clone(),
    };
    let paid = repo
        .mark_order_paid(order.id, receipt.clone())
        .await
        .unwrap()
        .unwrap();
    assert!(paid.is_paid && paid.paid_at.is_some());
    assert_eq!(paid.payment_result, Some(receipt));
    let delivered = repo.mark_order_delivered(order.id).await.unwrap().unwrap();
    assert!(delivered.is_delivered);

    let view = repo.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(view.user.unwrap().email, buyer.email);
    assert_eq!(repo.list_orders(Some(buyer.id)).await.unwrap().len(), 1);

    // 3. Huge quantities clamp at the integer floor instead of failing.
    repo.create_order(buyer.id, new_order(product.id, i32::MAX))
        .await
        .unwrap();
    repo.create_order(buyer.id, new_order(product.id, i32::MAX))
        .await
        .unwrap();
    let stock = repo.get_product(product.id).await.unwrap().unwrap().stock_quantity;
    assert_eq!(stock, i32::MIN);
}
