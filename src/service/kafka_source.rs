use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
    Message, Offset, TopicPartitionList,
};
use tokio::sync::Mutex;

use crate::service::{error::FeedError, event_source::EventSource};

/// Kafka topic feed, the transport the catalog and user services publish
/// like/unlike events on.
///
/// Auto-commit is off; the offset of a message is committed only once it
/// has been acknowledged, so a crash mid-event redelivers it to the group.
/// Rejected payloads are republished to `{topic}.{list}` before the commit.
pub struct KafkaEventSource {
    consumer: StreamConsumer,
    producer: FutureProducer,
    topic: String,
    /// (partition, offset) of the payload currently being processed
    in_flight: Mutex<Option<(i32, i64)>>,
    pub poll_timeout: Duration,
    pub commit_mode: CommitMode,
}

impl KafkaEventSource {
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()?;
        consumer.subscribe(&[topic])?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        tracing::info!(
            "✅ Subscribed to Kafka topic {} as group {} ({})",
            topic,
            group_id,
            brokers
        );

        Ok(Self {
            consumer,
            producer,
            topic: topic.to_string(),
            in_flight: Mutex::new(None),
            poll_timeout: Duration::from_secs(5),
            commit_mode: CommitMode::Async,
        })
    }

    fn side_topic(&self, list: &str) -> String {
        format!("{}.{}", self.topic, list)
    }
}

#[async_trait]
impl EventSource for KafkaEventSource {
    /// The group's committed offsets already resume at the first
    /// unacknowledged message.
    async fn recover_pending(&self) -> Result<usize, FeedError> {
        Ok(0)
    }

    async fn receive(&self) -> Result<Option<String>, FeedError> {
        let (payload, partition, offset) =
            match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
                Err(_) => return Ok(None),
                Ok(message) => {
                    let message = message?;
                    // Undecodable bytes still reach the invalidator so they get parked.
                    let payload = message
                        .payload()
                        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                        .unwrap_or_default();
                    (payload, message.partition(), message.offset())
                }
            };

        *self.in_flight.lock().await = Some((partition, offset));
        Ok(Some(payload))
    }

    async fn ack(&self, _payload: &str) -> Result<(), FeedError> {
        let position = self.in_flight.lock().await.take();
        if let Some((partition, offset)) = position {
            let mut offsets = TopicPartitionList::new();
            offsets.add_partition_offset(&self.topic, partition, Offset::Offset(offset + 1))?;
            self.consumer.commit(&offsets, self.commit_mode)?;
        }
        Ok(())
    }

    async fn reject(&self, payload: &str, list: &str) -> Result<(), FeedError> {
        let topic = self.side_topic(list);
        self.producer
            .send(
                FutureRecord::<(), str>::to(&topic).payload(payload),
                Duration::from_secs(5),
            )
            .await
            .map_err(|(e, _)| e)?;
        self.ack(payload).await
    }
}
