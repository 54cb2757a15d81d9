//! In-process product catalog for orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{ProductValidator, ValidatorError};
use crate::domain::order::{ProductId, ProductRecord};

#[derive(Clone, Default)]
pub struct StubCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductRecord>>>,
    outage: Arc<RwLock<Option<ValidatorError>>>,
    calls: Arc<AtomicUsize>,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, id: ProductId, name: &str, price: Decimal) {
        self.products.write().await.insert(
            id,
            ProductRecord {
                id,
                name: name.to_string(),
                price,
            },
        );
    }

    pub async fn remove(&self, id: ProductId) {
        self.products.write().await.remove(&id);
    }

    /// Make every following call fail with `err`
    pub async fn fail_with(&self, err: ValidatorError) {
        *self.outage.write().await = Some(err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductValidator for StubCatalog {
    async fn validate(&self, product_ids: &[ProductId]) -> Result<Vec<ProductRecord>, ValidatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.outage.read().await.clone() {
            return Err(err);
        }

        let products = self.products.read().await;
        let mut found = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            match products.get(id) {
                Some(product) => found.push(product.clone()),
                None => {
                    return Err(ValidatorError::Rejected {
                        status: 400,
                        message: format!("Some products were not found: {}", id),
                    })
                }
            }
        }

        // Product service replies are not ordered like the request
        found.reverse();
        Ok(found)
    }
}
