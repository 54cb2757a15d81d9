use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, AsyncConnectionConfig};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::{ReplyEnvelope, RequestEnvelope, RequestHandler, RpcClient, RpcException, TransportError};
use crate::utils::RetryConfig;

/// Extra room on top of a BRPOP timeout before the connection itself gives up.
const BLOCKING_GRACE: Duration = Duration::from_secs(2);

/// Idle reply listeners kept by a client between calls.
const MAX_IDLE_LISTENERS: usize = 8;

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

async fn blocking_connection(
    client: &redis::Client,
    block_for: Duration,
) -> Result<MultiplexedConnection, TransportError> {
    let config = AsyncConnectionConfig::new().set_response_timeout(block_for + BLOCKING_GRACE);
    Ok(client.get_multiplexed_async_connection_with_config(&config).await?)
}

/// Bounded stack of idle connections. A blocking BRPOP occupies a whole
/// multiplexed connection, so each in-flight call needs its own.
struct IdlePool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T> IdlePool<T> {
    fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    async fn take(&self) -> Option<T> {
        self.idle.lock().await.pop()
    }

    /// Returns `false` when the pool is full and `conn` was dropped.
    async fn put(&self, conn: T) -> bool {
        let mut idle = self.idle.lock().await;
        if idle.len() >= self.max_idle {
            return false;
        }
        idle.push(conn);
        true
    }
}

// ============================================================================
// Client - outbound requests to another service's queue
// ============================================================================

pub struct RedisRpcClient {
    client: redis::Client,
    listeners: IdlePool<MultiplexedConnection>,
    queue: String,
    timeout: Duration,
}

impl RedisRpcClient {
    /// Opens one connection up front so a bad URL fails at startup.
    pub async fn connect(
        client: redis::Client,
        queue: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listeners = IdlePool::new(MAX_IDLE_LISTENERS);
        listeners.put(blocking_connection(&client, timeout).await?).await;

        Ok(Self {
            client,
            listeners,
            queue: queue.into(),
            timeout,
        })
    }

    async fn checkout(&self) -> Result<MultiplexedConnection, TransportError> {
        match self.listeners.take().await {
            Some(conn) => Ok(conn),
            None => blocking_connection(&self.client, self.timeout).await,
        }
    }
}

#[async_trait]
impl RpcClient for RedisRpcClient {
    async fn send(&self, cmd: &str, data: Value) -> Result<Result<Value, RpcException>, TransportError> {
        let reply_to = format!("{}.reply.{}", self.queue, Uuid::new_v4());
        let request = RequestEnvelope::new(cmd, data, reply_to.clone());
        let payload = serde_json::to_string(&request)?;

        // A connection that errored is dropped, not returned to the pool
        let mut conn = self.checkout().await?;
        conn.lpush::<_, _, ()>(&self.queue, payload).await?;

        tracing::debug!(
            cmd = %cmd,
            request_id = %request.id,
            queue = %self.queue,
            "Sent request"
        );

        let popped: Option<(String, String)> = conn.brpop(&reply_to, self.timeout.as_secs_f64()).await?;
        self.listeners.put(conn).await;

        let Some((_, raw)) = popped else {
            return Err(TransportError::Timeout {
                cmd: cmd.to_string(),
                timeout: self.timeout,
            });
        };

        let reply: ReplyEnvelope = serde_json::from_str(&raw)?;
        Ok(reply.into_result())
    }
}

// ============================================================================
// Server - inbound request loop
// ============================================================================

pub struct RedisRpcServer {
    client: redis::Client,
    queue: String,
    reply_ttl: Duration,
    poll_interval: Duration,
}

impl RedisRpcServer {
    pub fn new(client: redis::Client, queue: impl Into<String>) -> Self {
        Self {
            client,
            queue: queue.into(),
            reply_ttl: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }

    async fn open(&self) -> Result<(MultiplexedConnection, MultiplexedConnection), TransportError> {
        let listener = blocking_connection(&self.client, self.poll_interval).await?;
        let publisher = self.client.get_multiplexed_async_connection().await?;
        Ok((listener, publisher))
    }

    /// Reopen both connections, backing off until Redis answers again.
    async fn reconnect(&self) -> (MultiplexedConnection, MultiplexedConnection) {
        let backoff = RetryConfig {
            max_attempts: u32::MAX,
            initial_delay: self.poll_interval,
            max_delay: MAX_RECONNECT_DELAY,
            multiplier: 2.0,
        };
        let mut delay = backoff.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            tokio::time::sleep(delay).await;
            attempt += 1;

            match self.open().await {
                Ok(connections) => {
                    tracing::info!(queue = %self.queue, attempt = attempt, "Reconnected to Redis");
                    return connections;
                }
                Err(e) => {
                    delay = backoff.next_delay(delay);
                    tracing::error!(
                        error = %e,
                        queue = %self.queue,
                        attempt = attempt,
                        retry_in_ms = delay.as_millis(),
                        "Redis reconnect failed"
                    );
                }
            }
        }
    }

    /// Pop requests until `shutdown` resolves. Each request is handled on
    /// its own task; replies are pushed to the request's `replyTo` list.
    /// Requests already being handled are finished before this returns.
    pub async fn serve(
        self,
        handler: Arc<dyn RequestHandler>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), TransportError> {
        tokio::pin!(shutdown);

        let opened = match self.open().await {
            Ok(connections) => Some(connections),
            Err(e) => {
                tracing::error!(error = %e, queue = %self.queue, "Redis unavailable at startup");
                None
            }
        };
        let (mut listener, mut publisher) = match opened {
            Some(connections) => connections,
            None => tokio::select! {
                _ = &mut shutdown => return Ok(()),
                connections = self.reconnect() => connections,
            },
        };

        tracing::info!(queue = %self.queue, "Listening for requests");

        let mut in_flight = JoinSet::new();
        loop {
            while in_flight.try_join_next().is_some() {}

            let popped = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(queue = %self.queue, "Request listener stopping");
                    break;
                }
                popped = listener.brpop::<_, Option<(String, String)>>(&self.queue, self.poll_interval.as_secs_f64()) => popped,
            };

            let raw = match popped {
                Ok(Some((_, raw))) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, queue = %self.queue, "Failed to pop request");
                    (listener, publisher) = tokio::select! {
                        _ = &mut shutdown => break,
                        connections = self.reconnect() => connections,
                    };
                    continue;
                }
            };

            let handler = handler.clone();
            let mut publisher = publisher.clone();
            let reply_ttl = self.reply_ttl;
            in_flight.spawn(async move {
                let Some((reply_to, payload)) = process_request(handler.as_ref(), &raw).await else {
                    return;
                };
                if let Err(e) = publish_reply(&mut publisher, &reply_to, payload, reply_ttl).await {
                    tracing::error!(error = %e, reply_to = %reply_to, "Failed to publish reply");
                }
            });
        }

        drain(in_flight).await;
        Ok(())
    }
}

async fn drain(mut in_flight: JoinSet<()>) {
    if !in_flight.is_empty() {
        tracing::info!(pending = in_flight.len(), "Waiting for in-flight requests");
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Request task failed");
        }
    }
}

/// Decode one raw request, run it, and encode the reply. Returns the reply
/// list and payload, or `None` when the request cannot be answered.
pub(crate) async fn process_request(handler: &dyn RequestHandler, raw: &str) -> Option<(String, String)> {
    let request: RequestEnvelope = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed request");
            return None;
        }
    };

    let reply = match handler.handle(&request.pattern.cmd, request.data).await {
        Ok(response) => ReplyEnvelope::ok(request.id, response),
        Err(err) => ReplyEnvelope::error(request.id, &err),
    };

    match serde_json::to_string(&reply) {
        Ok(payload) => Some((request.reply_to, payload)),
        Err(e) => {
            tracing::error!(error = %e, request_id = %request.id, "Failed to encode reply");
            None
        }
    }
}

async fn publish_reply(
    publisher: &mut MultiplexedConnection,
    reply_to: &str,
    payload: String,
    ttl: Duration,
) -> Result<(), TransportError> {
    publisher.lpush::<_, _, ()>(reply_to, payload).await?;
    publisher.expire::<_, ()>(reply_to, ttl.as_secs() as i64).await?;
    Ok(())
}
