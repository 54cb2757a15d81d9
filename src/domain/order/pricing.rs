use rust_decimal::{Decimal, RoundingStrategy};

use super::commands::RequestedItem;
use super::errors::OrderError;
use super::value_objects::{Catalog, EnrichedOrder, EnrichedOrderItem, OrderItem, OrderWithItems};

// ============================================================================
// Pricing & Enrichment - pure functions over a validated catalog
// ============================================================================

/// Items priced from the catalog, with the derived totals.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItems {
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub total_items: i32,
}

/// Scale of the `NUMERIC(10, 2)` money columns.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a `NUMERIC(10, 2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Round to the stored money scale, half away from zero as Postgres does.
pub fn to_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Snapshot each requested item's unit price from the catalog and compute
/// `Σ price × quantity` and `Σ quantity`.
///
/// Unit prices are rounded to the money scale before any arithmetic, so the
/// total always equals the sum over the stored items.
pub fn price_items(requested: &[RequestedItem], catalog: &Catalog) -> Result<PricedItems, OrderError> {
    let mut items = Vec::with_capacity(requested.len());
    let mut total_amount = Decimal::ZERO;
    let mut total_items: i32 = 0;

    for line in requested {
        let product = catalog.get(line.product_id).ok_or_else(|| {
            OrderError::validation(format!("Product with id {} not found", line.product_id))
        })?;

        let price = to_money(product.price);
        let line_total = price
            .checked_mul(Decimal::from(line.quantity))
            .ok_or_else(|| OrderError::validation("Order total overflows"))?;
        total_amount = total_amount
            .checked_add(line_total)
            .ok_or_else(|| OrderError::validation("Order total overflows"))?;
        total_items = total_items
            .checked_add(line.quantity)
            .ok_or_else(|| OrderError::validation("Order item count overflows"))?;

        items.push(OrderItem {
            product_id: line.product_id,
            quantity: line.quantity,
            price,
        });
    }

    if total_amount > MAX_AMOUNT {
        return Err(OrderError::validation(format!(
            "Order total {} exceeds the maximum of {}",
            total_amount, MAX_AMOUNT
        )));
    }

    Ok(PricedItems {
        items,
        total_amount,
        total_items,
    })
}

/// Attach product names to stored items. Prices and totals stay as stored.
pub fn enrich(order: OrderWithItems, catalog: &Catalog) -> Result<EnrichedOrder, OrderError> {
    let items = order
        .items
        .into_iter()
        .map(|item| {
            let product = catalog.get(item.product_id).ok_or_else(|| {
                OrderError::validation(format!(
                    "Product with id {} is no longer in the catalog",
                    item.product_id
                ))
            })?;
            Ok(EnrichedOrderItem {
                name: product.name.clone(),
                item,
            })
        })
        .collect::<Result<Vec<_>, OrderError>>()?;

    Ok(EnrichedOrder {
        order: order.order,
        items,
    })
}
