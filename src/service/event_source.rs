use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::service::error::FeedError;

/// Parking suffix for payloads that could not be decoded.
pub const BAD_PAYLOADS: &str = "bad_payloads";
/// Parking suffix for events whose processing kept failing.
pub const DEAD_LETTER: &str = "dead_letter";

/// Ordered feed of raw event payloads with explicit acknowledgement.
///
/// Consumers hold at most one payload in flight: `ack` and `reject` always
/// refer to the payload most recently returned by `receive`.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Return events a previous consumer took but never acknowledged to the
    /// head of the feed. Returns how many were moved.
    async fn recover_pending(&self) -> Result<usize, FeedError>;

    /// Next payload in delivery order, or `None` when the feed stayed idle
    /// for the poll window.
    async fn receive(&self) -> Result<Option<String>, FeedError>;

    /// Mark the in-flight payload as fully processed.
    async fn ack(&self, payload: &str) -> Result<(), FeedError>;

    /// Park the in-flight payload under the `list` suffix and acknowledge it.
    async fn reject(&self, payload: &str, list: &str) -> Result<(), FeedError>;
}

/// Redis list feed. Producers `RPUSH` onto `queue_key`; the consumer moves
/// the head into `{queue_key}:processing` with `BLMOVE` and removes it there
/// once handled, so a crash between the two leaves the event recoverable.
#[derive(Clone)]
pub struct RedisEventSource {
    conn: ConnectionManager,
    pub queue_key: String,
    processing_key: String,
    /// BLMOVE timeout in seconds
    pub poll_timeout: usize,
}

impl RedisEventSource {
    pub fn new(conn: ConnectionManager, queue_key: &str) -> Self {
        Self {
            conn,
            queue_key: queue_key.to_string(),
            processing_key: format!("{}:processing", queue_key),
            poll_timeout: 5,
        }
    }

    fn side_list(&self, list: &str) -> String {
        format!("{}:{}", self.queue_key, list)
    }
}

#[async_trait]
impl EventSource for RedisEventSource {
    async fn recover_pending(&self) -> Result<usize, FeedError> {
        let mut conn = self.conn.clone();
        let mut moved = 0;

        // Newest pending first onto the head keeps delivery order.
        loop {
            let item: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.queue_key)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;
            if item.is_none() {
                break;
            }
            moved += 1;
        }

        Ok(moved)
    }

    async fn receive(&self) -> Result<Option<String>, FeedError> {
        let mut conn = self.conn.clone();
        let payload = redis::cmd("BLMOVE")
            .arg(&self.queue_key)
            .arg(&self.processing_key)
            .arg("LEFT")
            .arg("RIGHT")
            .arg(self.poll_timeout)
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(payload)
    }

    async fn ack(&self, payload: &str) -> Result<(), FeedError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(&self.processing_key, 1, payload).await?;
        Ok(())
    }

    async fn reject(&self, payload: &str, list: &str) -> Result<(), FeedError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(self.side_list(list), payload).await?;
        self.ack(payload).await
    }
}
