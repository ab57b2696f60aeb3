use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateProductRequest, FinancialKind, NotificationKind, Order, OrderView, Product, UpdateProductRequest,
};
use crate::services::profile_service::{personal_by_id, personal_for_user, student_for_user};
use crate::services::NotificationService;

const PRODUCT_COLUMNS: &str = "id, personal_id, name, description, price, active, created_at, updated_at";

/// Category used for income booked from store purchases
pub const STORE_INCOME_CATEGORY: &str = "Store";

#[derive(Clone)]
pub struct StoreService {
    db: PgPool,
    notifications: NotificationService,
}

impl StoreService {
    pub fn new(db: PgPool, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    pub async fn create_product(&self, user_id: Uuid, request: CreateProductRequest) -> AppResult<Product> {
        request.validate()?;
        let personal = personal_for_user(&self.db, user_id).await?;

        let now = Utc::now();
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (id, personal_id, name, description, price, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(personal.id)
        .bind(request.name)
        .bind(request.description)
        .bind(request.price)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(product)
    }

    pub async fn update_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> AppResult<Product> {
        request.validate()?;
        let personal = personal_for_user(&self.db, user_id).await?;

        sqlx::query_as::<_, Product>(&format!(
            "UPDATE products
             SET name = COALESCE($3, name),
                 description = COALESCE($4, description),
                 price = COALESCE($5, price),
                 active = COALESCE($6, active),
                 updated_at = $7
             WHERE id = $1 AND personal_id = $2
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product_id)
        .bind(personal.id)
        .bind(request.name)
        .bind(request.description)
        .bind(request.price)
        .bind(request.active)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::NotFound("Product"))
    }

    /// Hide a product from the storefront; past orders keep referencing it
    pub async fn deactivate_product(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        let request = UpdateProductRequest {
            name: None,
            description: None,
            price: None,
            active: Some(false),
        };
        self.update_product(user_id, product_id, request).await
    }

    /// Every product of the calling personal, inactive ones included
    pub async fn list_my_products(&self, user_id: Uuid) -> AppResult<Vec<Product>> {
        let personal = personal_for_user(&self.db, user_id).await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE personal_id = $1 ORDER BY created_at DESC"
        ))
        .bind(personal.id)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    pub async fn list_storefront(&self, personal_id: Uuid) -> AppResult<Vec<Product>> {
        let personal = personal_by_id(&self.db, personal_id).await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE personal_id = $1 AND active ORDER BY name ASC"
        ))
        .bind(personal.id)
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }

    /// Record an order and the matching income entry for the seller
    #[tracing::instrument(skip(self))]
    pub async fn purchase(&self, user_id: Uuid, product_id: Uuid) -> AppResult<Order> {
        let student = student_for_user(&self.db, user_id).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .filter(|product| product.active)
        .ok_or(AppError::NotFound("Product"))?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, product_id, student_id, personal_id, price, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, product_id, student_id, personal_id, price, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(product.id)
        .bind(student.id)
        .bind(product.personal_id)
        .bind(product.price)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        // Free products produce an order but no income
        if product.price > 0.0 {
            sqlx::query(
                "INSERT INTO financial_records (id, personal_id, kind, category, amount, description, occurred_on, student_id, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(Uuid::new_v4())
            .bind(product.personal_id)
            .bind(FinancialKind::Income)
            .bind(STORE_INCOME_CATEGORY)
            .bind(product.price)
            .bind(format!("Order {} - {}", order.id, product.name))
            .bind(now.date_naive())
            .bind(student.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(order_id = %order.id, product_id = %product.id, price = product.price, "order placed");

        let seller = personal_by_id(&self.db, product.personal_id).await?;
        self.notifications
            .notify(
                seller.user_id,
                NotificationKind::ProductPurchased,
                "New order",
                format!("{} bought \"{}\"", student.name, product.name),
                Some(serde_json::json!({
                    "order_id": order.id,
                    "product_id": product.id,
                    "price": product.price,
                })),
            )
            .await;

        Ok(order)
    }

    pub async fn list_my_orders(&self, user_id: Uuid) -> AppResult<Vec<OrderView>> {
        let student = student_for_user(&self.db, user_id).await?;

        let orders = sqlx::query_as::<_, OrderView>(
            "SELECT o.id, o.product_id, pr.name AS product_name, o.personal_id, p.display_name AS personal_name,
                    o.price, o.created_at
             FROM orders o
             JOIN products pr ON pr.id = o.product_id
             JOIN personal_profiles p ON p.id = o.personal_id
             WHERE o.student_id = $1
             ORDER BY o.created_at DESC",
        )
        .bind(student.id)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }
}
