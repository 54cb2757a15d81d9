use crate::domain::order::OrderError;
use crate::messaging::RpcException;

pub const NOT_FOUND: u16 = 404;
pub const INTERNAL_ERROR: u16 = 500;
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Every failure leaves the service as `{status, message}`.
impl From<OrderError> for RpcException {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => RpcException::new(NOT_FOUND, err.to_string()),
            OrderError::ValidationFailure { status, message } => RpcException::new(status, message),
            OrderError::UpstreamUnavailable(_) => RpcException::new(SERVICE_UNAVAILABLE, err.to_string()),
            // Failures of unknown shape carry no status of their own
            OrderError::Unexpected(message) => RpcException::bad_request(message),
        }
    }
}

/// Metric label for a reply status.
pub fn outcome_label(status: u16) -> &'static str {
    match status {
        NOT_FOUND => "not_found",
        SERVICE_UNAVAILABLE => "unavailable",
        s if s >= 500 => "error",
        _ => "invalid",
    }
}
