// ============================================================================
// Handlers - inbound command surface
// ============================================================================
//
// Decodes each request payload, calls the orders service, and maps every
// failure to the `{status, message}` wire error.
//
// ============================================================================

mod error_mapper;
mod orders_controller;

pub use orders_controller::OrdersController;
