use std::future::Future;
use std::sync::Arc;

use serde_json::from_str;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use crate::{
    db::{cache::RecoCache, recommendationdb::RecoStore},
    models::{
        eventmodel::{EventAction, ProductEvent},
        productmodel::PersistedRecommendation,
    },
    service::{
        error::ServiceError,
        event_source::{EventSource, BAD_PAYLOADS, DEAD_LETTER},
        generator::RecommendationGenerator,
        retry::{retry_with_backoff, RetryPolicy},
    },
};

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Like relation written and the pair's persisted row recomputed.
    Recomputed,
    /// Like relation written; the pair had no persisted row.
    Applied,
    Ignored,
}

/// Consumes like/unlike events one at a time and keeps persisted
/// recommendations in step with the like relation.
#[derive(Clone)]
pub struct EventInvalidator {
    store: Arc<dyn RecoStore>,
    cache: RecoCache,
    generator: RecommendationGenerator,
    source: Arc<dyn EventSource>,
    retry: RetryPolicy,
    /// Backoff applied to feed receive errors; doubles up to `max_idle_sleep`.
    pub idle_sleep: Duration,
    pub max_idle_sleep: Duration,
}

impl EventInvalidator {
    pub fn new(
        store: Arc<dyn RecoStore>,
        cache: RecoCache,
        source: Arc<dyn EventSource>,
        retry: RetryPolicy,
    ) -> Self {
        let generator = RecommendationGenerator::new(store.clone());
        Self {
            store,
            cache,
            generator,
            source,
            retry,
            idle_sleep: Duration::from_secs(1),
            max_idle_sleep: Duration::from_secs(30),
        }
    }

    async fn with_retry<T, E, F, Fut>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ServiceError>,
    {
        let operation = &operation;
        retry_with_backoff(
            move || async move { operation().await.map_err(Into::into) },
            &self.retry,
            ServiceError::is_transient,
        )
        .await
    }

    /// Run the consumer until `shutdown` flips to true. The in-flight event
    /// always completes before the loop checks the signal again.
    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        match self.source.recover_pending().await {
            Ok(0) => {}
            Ok(n) => tracing::warn!("EventInvalidator: requeued {} unacknowledged events", n),
            Err(e) => tracing::error!("EventInvalidator: failed to requeue pending events: {}", e),
        }

        let mut backoff = self.idle_sleep;
        tracing::info!("EventInvalidator: consuming product updates");

        loop {
            if *shutdown.borrow() {
                tracing::info!("EventInvalidator: shutdown requested, exiting loop");
                break;
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::info!("EventInvalidator: shutdown handle dropped, exiting loop");
                        break;
                    }
                    continue;
                }
                received = self.source.receive() => received,
            };

            match received {
                Ok(Some(payload)) => {
                    backoff = self.idle_sleep;
                    self.process_payload(&payload).await;
                }
                Ok(None) => {
                    // poll window elapsed, no data
                }
                Err(e) => {
                    tracing::error!(
                        "EventInvalidator: feed receive error: {}; retrying in {:?}",
                        e,
                        backoff
                    );
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(self.max_idle_sleep);
                }
            }
        }

        tracing::info!("EventInvalidator: stopped");
    }

    /// Decode, apply and acknowledge one raw payload. Failures are logged
    /// and parked; they never stop the consumer.
    pub async fn process_payload(&self, payload: &str) {
        let parked = match self.handle_payload(payload).await {
            Ok(outcome) => {
                tracing::debug!("EventInvalidator: event handled ({:?})", outcome);
                self.source.ack(payload).await
            }
            Err(ServiceError::MalformedEvent(reason)) => {
                tracing::error!(
                    "EventInvalidator: invalid event payload: {} ; payload: {}",
                    reason,
                    payload
                );
                self.source.reject(payload, BAD_PAYLOADS).await
            }
            Err(e) => {
                tracing::error!(
                    "EventInvalidator: failed to apply event: {} ; payload: {}",
                    e,
                    payload
                );
                self.source.reject(payload, DEAD_LETTER).await
            }
        };

        if let Err(e) = parked {
            tracing::error!("EventInvalidator: failed to acknowledge event: {}", e);
        }
    }

    pub async fn handle_payload(&self, payload: &str) -> Result<EventOutcome, ServiceError> {
        let event = from_str::<ProductEvent>(payload)
            .map_err(|e| ServiceError::MalformedEvent(e.to_string()))?;
        self.apply(&event).await
    }

    pub async fn apply(&self, event: &ProductEvent) -> Result<EventOutcome, ServiceError> {
        if event.action == EventAction::Other {
            return Ok(EventOutcome::Ignored);
        }

        let product_id = event.parsed_product_id().ok_or_else(|| {
            ServiceError::MalformedEvent(format!("product_id {:?} is not numeric", event.product_id))
        })?;
        let user_id = event.user_id;

        if self.with_retry(|| self.store.get_product(product_id)).await?.is_none() {
            tracing::warn!(
                "EventInvalidator: {:?} for unknown product {} ignored",
                event.action,
                product_id
            );
            return Ok(EventOutcome::Ignored);
        }

        match event.action {
            EventAction::Like => {
                let created = self.with_retry(|| self.store.add_like(user_id, product_id)).await?;
                tracing::info!(
                    "User {} liked product {}{}",
                    user_id,
                    product_id,
                    if created { "" } else { " (already liked)" }
                );
            }
            EventAction::Unlike => {
                let removed = self
                    .with_retry(|| self.store.remove_like(user_id, product_id))
                    .await?;
                tracing::info!(
                    "User {} unliked product {}{}",
                    user_id,
                    product_id,
                    if removed { "" } else { " (was not liked)" }
                );
            }
            EventAction::Other => return Ok(EventOutcome::Ignored),
        }

        self.refresh_recommendation(user_id, product_id).await
    }

    /// Recompute and overwrite the pair's persisted row if it has one, then
    /// drop its cache entry so the next request cannot see the old triple.
    async fn refresh_recommendation(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<EventOutcome, ServiceError> {
        let exists = self
            .with_retry(|| self.store.recommendation_exists(user_id, product_id))
            .await?;
        if !exists {
            return Ok(EventOutcome::Applied);
        }

        let products = self
            .with_retry(|| self.generator.generate(user_id, product_id))
            .await?;
        let ids: Vec<i32> = products.iter().map(|p| p.id).collect();
        let row = PersistedRecommendation::new(user_id, product_id, &ids);

        let updated = self.with_retry(|| self.store.update_recommendation(&row)).await?;
        self.with_retry(|| self.cache.invalidate_recommendations(user_id, product_id))
            .await?;

        if updated {
            tracing::info!(
                "Recomputed recommendations for user {} product {}: {:?}",
                user_id,
                product_id,
                ids
            );
            Ok(EventOutcome::Recomputed)
        } else {
            Ok(EventOutcome::Applied)
        }
    }
}
