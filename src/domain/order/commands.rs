use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderFilter, OrderStatus, PageRequest, ProductId};

// ============================================================================
// Order Commands - Inbound payloads, one per message pattern
// ============================================================================

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderPagination {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl OrderPagination {
    pub fn validate(self) -> Result<PageRequest, OrderError> {
        if self.page == 0 {
            return Err(OrderError::validation("page must be a positive number"));
        }
        if self.limit == 0 {
            return Err(OrderError::validation("limit must be a positive number"));
        }

        Ok(PageRequest {
            filter: OrderFilter { status: self.status },
            page: self.page,
            limit: self.limit,
        })
    }
}

/// Payload of the commands that only address an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderIdPayload {
    pub id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Accepted for compatibility with older clients; the catalog price
    /// always wins.
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub items: Vec<RequestedItem>,
}

impl CreateOrder {
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::validation("items must contain at least 1 element"));
        }

        for item in &self.items {
            if item.product_id <= 0 {
                return Err(OrderError::validation(format!(
                    "productId must be a positive number, got {}",
                    item.product_id
                )));
            }
            if item.quantity <= 0 {
                return Err(OrderError::validation(format!(
                    "quantity must be a positive number, got {}",
                    item.quantity
                )));
            }
        }

        Ok(())
    }
}

/// Whitelisted auxiliary fields. Identity, totals, status and items are not
/// part of the type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderPatch {
    pub paid: Option<bool>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.paid.is_none() && self.paid_at.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateOrder {
    pub id: Uuid,
    #[serde(default)]
    pub paid: Option<bool>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

impl UpdateOrder {
    pub fn into_parts(self) -> (Uuid, OrderPatch) {
        let patch = OrderPatch {
            paid: self.paid,
            paid_at: self.paid_at,
        };
        (self.id, patch)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeOrderStatus {
    pub id: Uuid,
    pub status: OrderStatus,
}
