use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use super::{ProductValidator, ValidatorError};
use crate::domain::order::{distinct_product_ids, ProductId, ProductRecord};
use crate::messaging::{RpcClient, RpcException, TransportError};
use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RetryConfig, RetryResult,
};

const VALIDATE_PRODUCTS: &str = "validateProducts";
const BREAKER_NAME: &str = "product-service";

/// Product validator backed by the product service's `validateProducts`
/// command.
///
/// Transport failures trip the circuit breaker; rejections from the product
/// service do not. Retries only apply to transport failures and are off
/// unless `RetryConfig::max_attempts` is raised.
pub struct RpcProductValidator {
    client: Arc<dyn RpcClient>,
    circuit_breaker: CircuitBreaker,
    retry: RetryConfig,
    metrics: Option<Arc<Metrics>>,
}

impl RpcProductValidator {
    pub fn new(client: Arc<dyn RpcClient>) -> Self {
        Self {
            client,
            circuit_breaker: CircuitBreaker::new(BREAKER_NAME, CircuitBreakerConfig::default()),
            retry: RetryConfig::single_attempt(),
            metrics: None,
        }
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = CircuitBreaker::new(BREAKER_NAME, config);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn call_once(&self, product_ids: &[ProductId]) -> Result<Vec<ProductRecord>, ValidatorError> {
        let result = self
            .circuit_breaker
            .call(self.client.send(VALIDATE_PRODUCTS, json!(product_ids)))
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_circuit_state(self.circuit_breaker.get_state().await);
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(CircuitBreakerError::CircuitOpen) => {
                return Err(ValidatorError::Unavailable(
                    "circuit breaker open for product service".to_string(),
                ))
            }
            Err(CircuitBreakerError::OperationFailed(e @ TransportError::Timeout { .. })) => {
                return Err(ValidatorError::Unavailable(e.to_string()))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                return Err(ValidatorError::Unavailable(format!("product service call failed: {}", e)))
            }
        };

        let value = reply.map_err(|RpcException { status, message }| ValidatorError::Rejected { status, message })?;

        let records: Vec<ProductRecord> = serde_json::from_value(value).map_err(|e| {
            ValidatorError::Unavailable(format!("malformed validateProducts reply: {}", e))
        })?;

        ensure_complete(product_ids, &records)?;
        Ok(records)
    }
}

/// Every requested id must come back; a partial catalog is a rejection.
fn ensure_complete(requested: &[ProductId], records: &[ProductRecord]) -> Result<(), ValidatorError> {
    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !records.iter().any(|r| r.id == **id))
        .map(|id| id.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidatorError::Rejected {
            status: 400,
            message: format!("Some products were not found: {}", missing.join(", ")),
        })
    }
}

#[async_trait]
impl ProductValidator for RpcProductValidator {
    #[tracing::instrument(skip(self), fields(count = product_ids.len()))]
    async fn validate(&self, product_ids: &[ProductId]) -> Result<Vec<ProductRecord>, ValidatorError> {
        let ids = distinct_product_ids(product_ids.iter().copied());
        let started = Instant::now();

        let result = match retry_on_transient(self.retry.clone(), |_attempt| self.call_once(&ids)).await {
            RetryResult::Success(records) => Ok(records),
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => Err(e),
        };

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(ValidatorError::Rejected { .. }) => "rejected",
                Err(ValidatorError::Unavailable(_)) => "unavailable",
            };
            metrics.record_product_validation(outcome, started.elapsed());
        }

        match &result {
            Ok(records) => tracing::debug!(records = records.len(), "Products validated"),
            Err(e) => tracing::warn!(error = %e, "Product validation failed"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::CircuitState;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Mutex;

    type Scripted = Result<Result<Value, RpcException>, TransportError>;

    /// Replays scripted replies and records what was sent
    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Scripted>>,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RpcClient for ScriptedClient {
        async fn send(&self, cmd: &str, data: Value) -> Scripted {
            self.sent.lock().await.push((cmd.to_string(), data));
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(Ok(json!([]))))
        }
    }

    fn timeout() -> TransportError {
        TransportError::Timeout {
            cmd: VALIDATE_PRODUCTS.to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_sends_deduplicated_ids() {
        let client = ScriptedClient::new(vec![Ok(Ok(json!([
            { "id": 2, "name": "Mouse", "price": 5.0 },
            { "id": 1, "name": "Keyboard", "price": 10.0 }
        ])))]);
        let validator = RpcProductValidator::new(client.clone());

        let records = validator.validate(&[1, 2, 1]).await.unwrap();

        assert_eq!(records.len(), 2);
        let sent = client.sent.lock().await;
        assert_eq!(sent[0].0, "validateProducts");
        assert_eq!(sent[0].1, json!([1, 2]));
        let keyboard = records.iter().find(|r| r.id == 1).unwrap();
        assert_eq!(keyboard.price, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn test_remote_rejection_keeps_status_and_message() {
        let client = ScriptedClient::new(vec![Ok(Err(RpcException::new(
            400,
            "Some products were not found",
        )))]);
        let validator = RpcProductValidator::new(client);

        let err = validator.validate(&[99]).await.unwrap_err();
        assert_eq!(
            err,
            ValidatorError::Rejected {
                status: 400,
                message: "Some products were not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_incomplete_reply_is_rejected() {
        let client = ScriptedClient::new(vec![Ok(Ok(json!([
            { "id": 1, "name": "Keyboard", "price": 10.0 }
        ])))]);
        let validator = RpcProductValidator::new(client);

        let err = validator.validate(&[1, 2]).await.unwrap_err();
        assert!(matches!(err, ValidatorError::Rejected { ref message, .. } if message.contains('2')));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable_and_not_retried_by_default() {
        let client = ScriptedClient::new(vec![Err(timeout()), Ok(Ok(json!([])))]);
        let validator = RpcProductValidator::new(client.clone());

        let err = validator.validate(&[1]).await.unwrap_err();

        assert!(matches!(err, ValidatorError::Unavailable(_)));
        assert_eq!(client.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let client = ScriptedClient::new(vec![
            Err(timeout()),
            Ok(Ok(json!([{ "id": 1, "name": "Keyboard", "price": "10.00" }]))),
        ]);
        let validator = RpcProductValidator::new(client.clone()).with_retry(RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        });

        let records = validator.validate(&[1]).await.unwrap();

        assert_eq!(records[0].name, "Keyboard");
        assert_eq!(client.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejections_do_not_open_the_circuit() {
        let replies = (0..3)
            .map(|_| Ok(Err(RpcException::new(400, "unknown product"))))
            .collect();
        let client = ScriptedClient::new(replies);
        let validator = RpcProductValidator::new(client).with_circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_secs(30),
            success_threshold: 1,
        });

        for _ in 0..3 {
            assert!(validator.validate(&[7]).await.is_err());
        }
        assert_eq!(validator.circuit_breaker.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast() {
        let client = ScriptedClient::new(vec![Err(timeout()), Err(timeout())]);
        let validator = RpcProductValidator::new(client.clone()).with_circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_secs(30),
            success_threshold: 1,
        });

        let _ = validator.validate(&[1]).await;
        let _ = validator.validate(&[1]).await;
        let err = validator.validate(&[1]).await.unwrap_err();

        assert!(matches!(err, ValidatorError::Unavailable(ref reason) if reason.contains("circuit")));
        assert_eq!(client.sent.lock().await.len(), 2);
    }
}
