// ============================================================================
// Product Validator - remote product catalog lookups
// ============================================================================
//
// The order service does not own product data. Every price and name comes
// from the product service through this capability.
//
// ============================================================================

use async_trait::async_trait;

use crate::domain::order::{ProductId, ProductRecord};
use crate::utils::IsTransient;

mod rpc;
#[cfg(test)]
pub mod stub;

pub use rpc::RpcProductValidator;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidatorError {
    /// The call did not complete: transport failure, timeout, open circuit
    #[error("{0}")]
    Unavailable(String),

    /// The product service answered with an error, e.g. unknown ids
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl IsTransient for ValidatorError {
    fn is_transient(&self) -> bool {
        matches!(self, ValidatorError::Unavailable(_))
    }
}

#[async_trait]
pub trait ProductValidator: Send + Sync {
    /// Resolve every id to its catalog record. Either all ids resolve or the
    /// call fails; the reply order is unspecified.
    async fn validate(&self, product_ids: &[ProductId]) -> Result<Vec<ProductRecord>, ValidatorError>;
}
