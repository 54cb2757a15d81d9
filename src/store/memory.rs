use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewOrder, NewOrderItem, OrderStore, StoreError};
use crate::domain::order::{Order, OrderFilter, OrderItem, OrderPatch, OrderStatus, OrderWithItems};

/// In-memory order store.
///
/// Orders live in a map guarded by a single lock, so creating an order with
/// its items is trivially atomic. Used by tests and `ORDERS_STORE=memory`.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, OrderWithItems>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls that reached the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn matches(filter: &OrderFilter, order: &Order) -> bool {
        filter.status.map_or(true, |status| order.status == status)
    }

    async fn modify(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut Order),
    ) -> Result<Order, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut orders = self.orders.write().await;
        let stored = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply(&mut stored.order);
        stored.order.updated_at = Utc::now();
        Ok(stored.order.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn count(&self, filter: &OrderFilter) -> Result<u64, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| Self::matches(filter, &o.order)).count() as u64)
    }

    async fn list(&self, filter: &OrderFilter, skip: u64, take: u64) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| Self::matches(filter, &o.order))
            .map(|o| o.order.clone())
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(matching
            .into_iter()
            .skip(skip as usize)
            .take(take as usize)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderWithItems>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id).cloned())
    }

    async fn create_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<OrderWithItems, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let created = OrderWithItems {
            order: Order {
                id: Uuid::new_v4(),
                total_amount: order.total_amount,
                total_items: order.total_items,
                status: order.status,
                paid: false,
                paid_at: None,
                created_at: now,
                updated_at: now,
            },
            items: items
                .into_iter()
                .map(|item| OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
        };

        let mut orders = self.orders.write().await;
        orders.insert(created.order.id, created.clone());
        Ok(created)
    }

    async fn update_fields(&self, id: Uuid, patch: OrderPatch) -> Result<Order, StoreError> {
        self.modify(id, |order| {
            if let Some(paid) = patch.paid {
                order.paid = paid;
            }
            if let Some(paid_at) = patch.paid_at {
                order.paid_at = Some(paid_at);
            }
        })
        .await
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        self.modify(id, |order| order.status = status).await
    }
}
