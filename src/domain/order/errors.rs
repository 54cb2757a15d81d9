use uuid::Uuid;

use crate::products::ValidatorError;
use crate::store::StoreError;

// ============================================================================
// Order Domain Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order with id {0} not found")]
    NotFound(Uuid),

    /// Unknown products, malformed payloads, or totals that cannot be
    /// computed. `status` is 400 unless the product service chose another.
    #[error("{message}")]
    ValidationFailure { status: u16, message: String },

    #[error("Product service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Unexpected(String),
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        OrderError::ValidationFailure {
            status: 400,
            message: message.into(),
        }
    }
}

impl From<ValidatorError> for OrderError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::Unavailable(reason) => OrderError::UpstreamUnavailable(reason),
            ValidatorError::Rejected { status, message } => {
                OrderError::ValidationFailure { status, message }
            }
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            other => OrderError::Unexpected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_carries_id() {
        let id = Uuid::new_v4();
        assert_eq!(
            OrderError::NotFound(id).to_string(),
            format!("Order with id {} not found", id)
        );
    }

    #[test]
    fn test_validator_errors_map_to_domain_errors() {
        let err: OrderError = ValidatorError::Unavailable("timed out".into()).into();
        assert!(matches!(err, OrderError::UpstreamUnavailable(_)));

        let err: OrderError = ValidatorError::Rejected {
            status: 400,
            message: "Some products were not found".into(),
        }
        .into();
        assert_eq!(err, OrderError::validation("Some products were not found"));
    }

    #[test]
    fn test_store_not_found_becomes_order_not_found() {
        let id = Uuid::new_v4();
        let err: OrderError = StoreError::NotFound(id).into();
        assert_eq!(err, OrderError::NotFound(id));

        let err: OrderError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, OrderError::Unexpected(_)));
    }
}
