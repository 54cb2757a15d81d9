// ============================================================================
// Order Domain
// ============================================================================
//
// - Value objects (Order, OrderItem, OrderStatus, pagination)
// - Commands (one inbound payload per message pattern)
// - Errors (OrderError)
// - Pricing (catalog snapshot, totals, enrichment)
// - Service (OrdersService, the orchestrator)
//
// ============================================================================

pub mod commands;
pub mod errors;
pub mod pricing;
pub mod service;
pub mod value_objects;

pub use commands::*;
pub use errors::*;
pub use service::OrdersService;
pub use value_objects::*;
