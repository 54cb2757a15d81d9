use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{NewOrder, NewOrderItem, OrderStore, StoreError};
use crate::domain::order::{Order, OrderFilter, OrderItem, OrderPatch, OrderStatus, OrderWithItems};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Tables (see migrations/):
// - orders      one row per order, totals and status
// - order_items one row per line, with the unit price snapshot
//
// `create_with_items` runs in a single transaction.
//
// ============================================================================

const ORDER_COLUMNS: &str =
    "id, total_amount, total_items, status, paid, paid_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    total_amount: Decimal,
    total_items: i32,
    status: OrderStatus,
    paid: bool,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            total_amount: row.total_amount,
            total_items: row.total_items,
            status: row.status,
            paid: row.paid,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    product_id: i32,
    quantity: i32,
    price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database connected");

        Ok(Self::new(pool))
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, StoreError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT product_id, quantity, price FROM order_items WHERE order_id = $1 ORDER BY line_no",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn count(&self, filter: &OrderFilter) -> Result<u64, StoreError> {
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.max(0) as u64)
    }

    async fn list(&self, filter: &OrderFilter, skip: u64, take: u64) -> Result<Vec<Order>, StoreError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE ($1::order_status IS NULL OR status = $1) \
             ORDER BY created_at ASC, id ASC \
             OFFSET $2 LIMIT $3"
        );

        let rows: Vec<OrderRow> = sqlx::query_as(&query)
            .bind(filter.status)
            .bind(skip as i64)
            .bind(take as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderWithItems>, StoreError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.load_items(id).await?;
        Ok(Some(OrderWithItems {
            order: row.into(),
            items,
        }))
    }

    async fn create_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<OrderWithItems, StoreError> {
        let order_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO orders (id, total_amount, total_items, status) \
             VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        );
        let row: OrderRow = sqlx::query_as(&query)
            .bind(order_id)
            .bind(order.total_amount)
            .bind(order.total_items)
            .bind(order.status)
            .fetch_one(&mut *tx)
            .await?;

        let mut stored_items = Vec::with_capacity(items.len());
        for (line_no, item) in items.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, line_no, product_id, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(line_no as i32)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;

            stored_items.push(OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            });
        }

        tx.commit().await?;

        tracing::debug!(
            order_id = %order_id,
            item_count = stored_items.len(),
            "Inserted order with items"
        );

        Ok(OrderWithItems {
            order: row.into(),
            items: stored_items,
        })
    }

    async fn update_fields(&self, id: Uuid, patch: OrderPatch) -> Result<Order, StoreError> {
        let query = format!(
            "UPDATE orders SET paid = COALESCE($2, paid), paid_at = COALESCE($3, paid_at), \
             updated_at = now() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row: Option<OrderRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(patch.paid)
            .bind(patch.paid_at)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::from).ok_or(StoreError::NotFound(id))
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        let query = format!(
            "UPDATE orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row: Option<OrderRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::from).ok_or(StoreError::NotFound(id))
    }
}
