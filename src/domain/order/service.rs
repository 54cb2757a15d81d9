use std::sync::Arc;

use uuid::Uuid;

use super::commands::{ChangeOrderStatus, CreateOrder, OrderPatch};
use super::errors::OrderError;
use super::pricing::{enrich, price_items};
use super::value_objects::{
    distinct_product_ids, Catalog, EnrichedOrder, Order, OrderStatus, OrderWithItems, PageMeta, PageRequest,
    Paginated, ProductId,
};
use crate::products::ProductValidator;
use crate::store::{NewOrder, NewOrderItem, OrderStore};

// ============================================================================
// Orders Service - orchestrates the store and the product catalog
// ============================================================================
//
// Prices are snapshotted from the catalog when an order is created and never
// recomputed. Reads re-validate the referenced products so that items carry
// the current product names; mutations go through the same read first.
//
// ============================================================================

pub struct OrdersService {
    store: Arc<dyn OrderStore>,
    products: Arc<dyn ProductValidator>,
}

impl OrdersService {
    pub fn new(store: Arc<dyn OrderStore>, products: Arc<dyn ProductValidator>) -> Self {
        Self { store, products }
    }

    async fn catalog_for(&self, product_ids: &[ProductId]) -> Result<Catalog, OrderError> {
        let records = self.products.validate(product_ids).await?;
        Ok(Catalog::from_records(records))
    }

    async fn load(&self, id: Uuid) -> Result<OrderWithItems, OrderError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(OrderError::NotFound(id))
    }

    #[tracing::instrument(skip(self, request), fields(page = request.page, limit = request.limit))]
    pub async fn list_orders(&self, request: PageRequest) -> Result<Paginated<Order>, OrderError> {
        let total = self.store.count(&request.filter).await?;
        let data = self
            .store
            .list(&request.filter, request.skip(), u64::from(request.limit))
            .await?;

        Ok(Paginated {
            data,
            meta: PageMeta::new(total, request.page, request.limit),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<EnrichedOrder, OrderError> {
        let order = self.load(id).await?;
        let catalog = self.catalog_for(&order.product_ids()).await?;
        enrich(order, &catalog)
    }

    #[tracing::instrument(skip(self, command), fields(items = command.items.len()))]
    pub async fn create_order(&self, command: CreateOrder) -> Result<EnrichedOrder, OrderError> {
        command.validate()?;

        let product_ids = distinct_product_ids(command.items.iter().map(|item| item.product_id));
        let catalog = self.catalog_for(&product_ids).await?;
        let priced = price_items(&command.items, &catalog)?;

        let new_order = NewOrder {
            total_amount: priced.total_amount,
            total_items: priced.total_items,
            status: OrderStatus::initial(),
        };
        let new_items = priced
            .items
            .into_iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
            })
            .collect();

        let created = self.store.create_with_items(new_order, new_items).await?;
        tracing::info!(
            order_id = %created.order.id,
            total_amount = %created.order.total_amount,
            total_items = created.order.total_items,
            "Order created"
        );

        enrich(created, &catalog)
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update_order(&self, id: Uuid, patch: OrderPatch) -> Result<Order, OrderError> {
        let current = self.get_order(id).await?;
        if patch.is_empty() {
            return Ok(current.order);
        }

        let updated = self.store.update_fields(id, patch).await?;
        tracing::info!(order_id = %id, "Order updated");
        Ok(updated)
    }

    /// Soft delete: the order stays, its status becomes cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.get_order(id).await?;

        let cancelled = self.store.set_status(id, OrderStatus::cancelled()).await?;
        tracing::info!(order_id = %id, "Order cancelled");
        Ok(cancelled)
    }

    /// Returns the bare order row in both branches, without the item list
    /// that `get_order` adds. An unchanged status is not written.
    #[tracing::instrument(skip(self, command), fields(order_id = %command.id, status = %command.status))]
    pub async fn change_order_status(&self, command: ChangeOrderStatus) -> Result<Order, OrderError> {
        let current = self.get_order(command.id).await?;

        if current.order.status == command.status {
            tracing::debug!("Status unchanged, skipping write");
            return Ok(current.order);
        }

        let updated = self.store.set_status(command.id, command.status).await?;
        tracing::info!(from = %current.order.status, to = %updated.status, "Order status changed");
        Ok(updated)
    }
}
