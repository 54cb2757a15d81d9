// ============================================================================
// Messaging - request/reply over Redis lists
// ============================================================================
//
// Every service owns one inbound queue. A request names the command in
// `pattern.cmd` and the list the reply must be pushed to. The same transport
// carries our inbound commands and our outbound calls to the product service.
//
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

mod envelope;
mod redis_transport;
mod rpc_exception;

pub use envelope::{ReplyEnvelope, RequestEnvelope};
pub use redis_transport::{RedisRpcClient, RedisRpcServer};
pub use rpc_exception::RpcException;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No reply to '{cmd}' within {timeout:?}")]
    Timeout { cmd: String, timeout: Duration },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Malformed message: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Outbound side: send a command to another service and wait for its reply.
///
/// The outer `Result` is the transport; the inner one is the remote
/// service's answer.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn send(&self, cmd: &str, data: Value) -> Result<Result<Value, RpcException>, TransportError>;
}

/// Inbound side: whatever answers the commands popped off our queue.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, cmd: &str, data: Value) -> Result<Value, RpcException>;
}
