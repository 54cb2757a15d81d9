// ============================================================================
// Order Store - persistence for orders and their items
// ============================================================================
//
// Pure data access. No business rule lives behind this trait; the one
// guarantee implementations must give is that `create_with_items` writes the
// order and all of its items, or nothing.
//
// ============================================================================

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::order::{Order, OrderFilter, OrderPatch, OrderStatus, OrderWithItems, ProductId};

mod memory;
mod postgres;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order {0} does not exist")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Order row fields decided by the orchestrator at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub total_amount: Decimal,
    pub total_items: i32,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Decimal,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn count(&self, filter: &OrderFilter) -> Result<u64, StoreError>;

    async fn list(&self, filter: &OrderFilter, skip: u64, take: u64) -> Result<Vec<Order>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderWithItems>, StoreError>;

    /// Atomic: the order row and every item row, or nothing
    async fn create_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<OrderWithItems, StoreError>;

    async fn update_fields(&self, id: Uuid, patch: OrderPatch) -> Result<Order, StoreError>;

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError>;
}
