use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error_mapper::{outcome_label, INTERNAL_ERROR};
use crate::domain::order::{
    ChangeOrderStatus, CreateOrder, OrderError, OrderIdPayload, OrderPagination, OrdersService, UpdateOrder,
};
use crate::messaging::{RequestHandler, RpcException};
use crate::metrics::Metrics;

pub const GET_ORDERS: &str = "getOrders";
pub const GET_ORDER: &str = "getOrder";
pub const CREATE_ORDER: &str = "createOrder";
pub const UPDATE_ORDER: &str = "updateOrder";
pub const DELETE_ORDER: &str = "deleteOrder";
pub const CHANGE_ORDER_STATUS: &str = "changeOrderStatus";

/// Routes inbound order commands to [`OrdersService`].
pub struct OrdersController {
    service: Arc<OrdersService>,
    metrics: Option<Arc<Metrics>>,
}

impl OrdersController {
    pub fn new(service: Arc<OrdersService>) -> Self {
        Self { service, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn dispatch(&self, cmd: &str, data: Value) -> Result<Value, RpcException> {
        match cmd {
            GET_ORDERS => {
                let request = decode::<OrderPagination>(data)?.validate()?;
                reply(self.service.list_orders(request).await)
            }
            GET_ORDER => {
                let OrderIdPayload { id } = decode(data)?;
                reply(self.service.get_order(id).await)
            }
            CREATE_ORDER => {
                let command: CreateOrder = decode(data)?;
                reply(self.service.create_order(command).await)
            }
            UPDATE_ORDER => {
                let (id, patch) = decode::<UpdateOrder>(data)?.into_parts();
                reply(self.service.update_order(id, patch).await)
            }
            DELETE_ORDER => {
                let OrderIdPayload { id } = decode(data)?;
                reply(self.service.delete_order(id).await)
            }
            CHANGE_ORDER_STATUS => {
                let command: ChangeOrderStatus = decode(data)?;
                reply(self.service.change_order_status(command).await)
            }
            unknown => Err(RpcException::bad_request(format!("Unknown command: {}", unknown))),
        }
    }
}

/// A missing payload decodes like an empty object.
fn decode<T: DeserializeOwned>(data: Value) -> Result<T, RpcException> {
    let data = match data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    Ok(serde_json::from_value(data)?)
}

fn reply<T: Serialize>(result: Result<T, OrderError>) -> Result<Value, RpcException> {
    let value = result?;
    serde_json::to_value(value)
        .map_err(|e| RpcException::new(INTERNAL_ERROR, format!("Failed to encode reply: {}", e)))
}

#[async_trait]
impl RequestHandler for OrdersController {
    async fn handle(&self, cmd: &str, data: Value) -> Result<Value, RpcException> {
        let started = Instant::now();
        tracing::debug!(cmd = %cmd, "Handling command");

        let result = self.dispatch(cmd, data).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => {
                tracing::error!(cmd = %cmd, status = err.status, error = %err, "Command failed");
                outcome_label(err.status)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_request(cmd, outcome, started.elapsed());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::stub::StubCatalog;
    use crate::products::ValidatorError;
    use crate::domain::order::{Order, OrderFilter, OrderPatch, OrderStatus, OrderWithItems};
    use crate::store::{MemoryOrderStore, NewOrder, NewOrderItem, OrderStore, StoreError};
    use rust_decimal::Decimal;
    use serde_json::json;
    use uuid::Uuid;

    /// Every call fails like a dropped database connection
    struct BrokenStore;

    fn broken() -> StoreError {
        StoreError::Backend("connection reset".to_string())
    }

    #[async_trait]
    impl OrderStore for BrokenStore {
        async fn count(&self, _: &OrderFilter) -> Result<u64, StoreError> {
            Err(broken())
        }

        async fn list(&self, _: &OrderFilter, _: u64, _: u64) -> Result<Vec<Order>, StoreError> {
            Err(broken())
        }

        async fn find_by_id(&self, _: Uuid) -> Result<Option<OrderWithItems>, StoreError> {
            Err(broken())
        }

        async fn create_with_items(&self, _: NewOrder, _: Vec<NewOrderItem>) -> Result<OrderWithItems, StoreError> {
            Err(broken())
        }

        async fn update_fields(&self, _: Uuid, _: OrderPatch) -> Result<Order, StoreError> {
            Err(broken())
        }

        async fn set_status(&self, _: Uuid, _: OrderStatus) -> Result<Order, StoreError> {
            Err(broken())
        }
    }

    async fn controller() -> (OrdersController, StubCatalog, Arc<Metrics>) {
        let catalog = StubCatalog::new();
        catalog.put(1, "Keyboard", Decimal::new(1000, 2)).await;
        catalog.put(2, "Mouse", Decimal::new(500, 2)).await;

        let service = OrdersService::new(Arc::new(MemoryOrderStore::new()), Arc::new(catalog.clone()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let controller = OrdersController::new(Arc::new(service)).with_metrics(metrics.clone());
        (controller, catalog, metrics)
    }

    async fn create(controller: &OrdersController) -> Value {
        controller
            .handle(
                CREATE_ORDER,
                json!({ "items": [{ "productId": 1, "quantity": 2 }, { "productId": 2, "quantity": 1 }] }),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_order_reply_shape() {
        let (controller, _, _) = controller().await;

        let order = create(&controller).await;

        assert_eq!(order["totalAmount"], json!("25.00"));
        assert_eq!(order["totalItems"], 3);
        assert_eq!(order["status"], "PENDING");
        assert_eq!(order["paid"], false);
        assert_eq!(order["items"][0]["productId"], 1);
        assert_eq!(order["items"][0]["name"], "Keyboard");
        assert_eq!(order["items"][0]["price"], json!("10.00"));
    }

    #[tokio::test]
    async fn test_get_orders_defaults_and_meta() {
        let (controller, _, _) = controller().await;
        create(&controller).await;

        let page = controller.handle(GET_ORDERS, Value::Null).await.unwrap();

        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        assert_eq!(page["meta"]["total"], 1);
        assert_eq!(page["meta"]["page"], 1);
        assert_eq!(page["meta"]["lastPage"], 1);
    }

    #[tokio::test]
    async fn test_get_orders_rejects_bad_filters() {
        let (controller, _, _) = controller().await;

        let err = controller
            .handle(GET_ORDERS, json!({ "status": "SHIPPED" }))
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);

        let err = controller.handle(GET_ORDERS, json!({ "page": 0 })).await.unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[tokio::test]
    async fn test_get_order_not_found_reply() {
        let (controller, _, _) = controller().await;
        let id = Uuid::new_v4();

        let err = controller.handle(GET_ORDER, json!({ "id": id })).await.unwrap_err();

        assert_eq!(err, RpcException::new(404, format!("Order with id {} not found", id)));
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let (controller, _, _) = controller().await;

        let err = controller
            .handle(GET_ORDER, json!({ "id": "not-a-uuid" }))
            .await
            .unwrap_err();

        assert_eq!(err.status, 400);
    }

    #[tokio::test]
    async fn test_update_order_rejects_protected_fields() {
        let (controller, _, _) = controller().await;
        let order = create(&controller).await;

        let err = controller
            .handle(UPDATE_ORDER, json!({ "id": order["id"], "totalAmount": 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);

        let updated = controller
            .handle(UPDATE_ORDER, json!({ "id": order["id"], "paid": true }))
            .await
            .unwrap();
        assert_eq!(updated["paid"], true);
        assert_eq!(updated["totalAmount"], order["totalAmount"]);
    }

    #[tokio::test]
    async fn test_delete_then_change_status() {
        let (controller, _, _) = controller().await;
        let order = create(&controller).await;

        let deleted = controller
            .handle(DELETE_ORDER, json!({ "id": order["id"] }))
            .await
            .unwrap();
        assert_eq!(deleted["status"], "CANCELLED");

        let changed = controller
            .handle(CHANGE_ORDER_STATUS, json!({ "id": order["id"], "status": "PAID" }))
            .await
            .unwrap();
        assert_eq!(changed["status"], "PAID");
    }

    #[tokio::test]
    async fn test_upstream_outage_is_503() {
        let (controller, catalog, _) = controller().await;
        catalog
            .fail_with(ValidatorError::Unavailable("no reply".to_string()))
            .await;

        let err = controller
            .handle(CREATE_ORDER, json!({ "items": [{ "productId": 1, "quantity": 1 }] }))
            .await
            .unwrap_err();

        assert_eq!(err.status, 503);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (controller, _, metrics) = controller().await;

        let err = controller.handle("findAllOrders", json!({})).await.unwrap_err();

        assert_eq!(err, RpcException::bad_request("Unknown command: findAllOrders"));
        let gathered = metrics.registry().gather();
        let requests = gathered.iter().find(|m| m.name() == "rpc_requests_total").unwrap();
        assert_eq!(requests.metric[0].counter.value, Some(1.0));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_bad_request() {
        let service = OrdersService::new(Arc::new(BrokenStore), Arc::new(StubCatalog::new()));
        let controller = OrdersController::new(Arc::new(service));

        let err = controller.handle(GET_ORDERS, json!({})).await.unwrap_err();

        assert_eq!(err, RpcException::new(400, "Store backend error: connection reset"));
    }
}
