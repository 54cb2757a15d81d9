// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure order rules and the orchestrator. Persistence and the product service
// are reached only through the `OrderStore` and `ProductValidator` traits.
//
// ============================================================================

pub mod order;
