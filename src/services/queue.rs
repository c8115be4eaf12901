use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::job::JobMessage;

/// A consumed message. It stays invisible to other consumers until it is acked
/// or its visibility timeout lapses, after which it is delivered again.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub payload: String,
}

/// Pop the oldest pending payload into the processing list and lease it, in one step.
/// KEYS: pending, processing, leases. ARGV: lease deadline (ms).
const CONSUME_SCRIPT: &str = r#"
local payload = redis.call('RPOPLPUSH', KEYS[1], KEYS[2])
if payload then
    redis.call('ZADD', KEYS[3], ARGV[1], payload)
end
return payload
"#;

/// Requeue processing payloads whose lease has lapsed or that have no lease at all.
/// KEYS: pending, processing, leases. ARGV: now (ms). Returns the number requeued.
const RECLAIM_SCRIPT: &str = r#"
local requeued = 0
local expired = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1])
for _, payload in ipairs(expired) do
    redis.call('ZREM', KEYS[3], payload)
    if redis.call('LREM', KEYS[2], 1, payload) > 0 then
        redis.call('RPUSH', KEYS[1], payload)
        requeued = requeued + 1
    end
end
for _, payload in ipairs(redis.call('LRANGE', KEYS[2], 0, -1)) do
    if not redis.call('ZSCORE', KEYS[3], payload) then
        redis.call('LREM', KEYS[2], 1, payload)
        redis.call('RPUSH', KEYS[1], payload)
        requeued = requeued + 1
    end
end
return requeued
"#;

/// At-least-once job queue carrying `{req}` envelopes.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn publish(&self, message: &JobMessage) -> Result<(), QueueError>;

    /// Take the next visible message, if any.
    async fn consume(&self) -> Result<Option<Delivery>, QueueError>;

    /// Confirm a delivery was processed; it will not be redelivered.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Make unacknowledged deliveries whose visibility timeout has lapsed visible again.
    async fn reclaim_expired(&self) -> Result<usize, QueueError>;

    /// Number of visible, not yet consumed messages.
    async fn depth(&self) -> Result<u64, QueueError>;

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Redis-backed reliable queue.
///
/// Pending messages live in a list; consuming moves one into a processing list and
/// records a lease deadline in a sorted set. Acking drops both entries. Every
/// multi-key transition runs as a single script so a payload is never stranded.
pub struct RedisJobQueue {
    client: redis::Client,
    consume_script: redis::Script,
    reclaim_script: redis::Script,
    pending_key: String,
    processing_key: String,
    leases_key: String,
    visibility_timeout: Duration,
}

impl RedisJobQueue {
    pub fn new(
        redis_url: &str,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            consume_script: redis::Script::new(CONSUME_SCRIPT),
            reclaim_script: redis::Script::new(RECLAIM_SCRIPT),
            pending_key: format!("{}:pending", queue_name),
            processing_key: format!("{}:processing", queue_name),
            leases_key: format!("{}:leases", queue_name),
            visibility_timeout,
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn publish(&self, message: &JobMessage) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(message).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(&self.pending_key, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn consume(&self) -> Result<Option<Delivery>, QueueError> {
        let mut conn = self.connection().await?;
        let deadline =
            Utc::now().timestamp_millis() + self.visibility_timeout.as_millis() as i64;
        let payload: Option<String> = self
            .consume_script
            .key(&self.pending_key)
            .key(&self.processing_key)
            .key(&self.leases_key)
            .arg(deadline)
            .invoke_async(&mut conn)
            .await
            .map_err(QueueError::Redis)?;

        Ok(payload.map(|payload| Delivery { payload }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::pipe()
            .atomic()
            .lrem(&self.processing_key, 1, &delivery.payload)
            .ignore()
            .zrem(&self.leases_key, &delivery.payload)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn reclaim_expired(&self) -> Result<usize, QueueError> {
        let mut conn = self.connection().await?;
        let requeued: usize = self
            .reclaim_script
            .key(&self.pending_key)
            .key(&self.processing_key)
            .key(&self.leases_key)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(requeued)
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.connection().await?;
        let depth: u64 = conn.llen(&self.pending_key).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

struct Lease {
    delivery: Delivery,
    deadline: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryQueueState {
    pending: VecDeque<String>,
    in_flight: Vec<Lease>,
}

/// In-process queue with the same visibility semantics as [`RedisJobQueue`].
pub struct MemoryJobQueue {
    state: Mutex<MemoryQueueState>,
    visibility_timeout: Duration,
    fail_publish: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryQueueState::default()),
            visibility_timeout,
            fail_publish: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `publish` fail as if the broker were unreachable.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Push a raw body, bypassing envelope serialization.
    pub fn publish_raw(&self, payload: impl Into<String>) {
        self.lock().pending.push_front(payload.into());
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Pending bodies, oldest first.
    pub fn pending_payloads(&self) -> Vec<String> {
        self.lock().pending.iter().rev().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryQueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn publish(&self, message: &JobMessage) -> Result<(), QueueError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("queue offline".to_string()));
        }
        let payload = serde_json::to_string(message).map_err(QueueError::Serialize)?;
        self.lock().pending.push_front(payload);
        Ok(())
    }

    async fn consume(&self) -> Result<Option<Delivery>, QueueError> {
        let mut state = self.lock();
        let Some(payload) = state.pending.pop_back() else {
            return Ok(None);
        };

        let now = Utc::now();
        let delivery = Delivery { payload };
        let deadline = chrono::Duration::from_std(self.visibility_timeout)
            .ok()
            .and_then(|t| now.checked_add_signed(t))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        state.in_flight.push(Lease {
            delivery: delivery.clone(),
            deadline,
        });
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.lock();
        if let Some(pos) = state
            .in_flight
            .iter()
            .position(|l| l.delivery.payload == delivery.payload)
        {
            state.in_flight.remove(pos);
        }
        Ok(())
    }

    async fn reclaim_expired(&self) -> Result<usize, QueueError> {
        let mut state = self.lock();
        let now = Utc::now();
        let (expired, live): (Vec<Lease>, Vec<Lease>) =
            std::mem::take(&mut state.in_flight)
                .into_iter()
                .partition(|l| l.deadline <= now);
        state.in_flight = live;

        let reclaimed = expired.len();
        for lease in expired {
            state.pending.push_back(lease.delivery.payload);
        }
        Ok(reclaimed)
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.lock().pending.len() as u64)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}
