use std::future::Future;
use std::sync::Arc;

use validator::Validate;

use crate::{
    db::{cache::RecoCache, recommendationdb::RecoStore},
    dtos::recommendationdtos::{RecommendationEntry, RecommendationRequestDto},
    models::productmodel::PersistedRecommendation,
    service::{
        error::ServiceError,
        generator::RecommendationGenerator,
        retry::{retry_with_backoff, RetryPolicy},
    },
};

/// Serves recommendations through cache → persisted row → fresh generation,
/// promoting a pair's result into the cache once it has been requested more
/// than `cache_threshold` times.
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn RecoStore>,
    cache: RecoCache,
    generator: RecommendationGenerator,
    cache_threshold: i64,
    cache_ttl: usize,
    retry: RetryPolicy,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn RecoStore>,
        cache: RecoCache,
        cache_threshold: i64,
        cache_ttl_seconds: usize,
        retry: RetryPolicy,
    ) -> Self {
        let generator = RecommendationGenerator::new(store.clone());
        Self {
            store,
            cache,
            generator,
            cache_threshold,
            cache_ttl: cache_ttl_seconds,
            retry,
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

    pub async fn recommend(
        &self,
        request: &RecommendationRequestDto,
    ) -> Result<Vec<RecommendationEntry>, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let (user_id, product_id) = (request.user_id, request.product_id);

        // 1. Cached payload wins outright
        if let Some(cached) = self
            .with_retry(|| self.cache.get_recommendations(user_id, product_id))
            .await?
        {
            return Ok(cached);
        }

        // 2. Frequency accounting. INCR is not idempotent, so no retry here.
        let request_count = self
            .cache
            .increment_request_count(user_id, product_id)
            .await?;

        // 3. Persisted row, or generate and persist
        let persisted = self
            .with_retry(|| self.store.get_recommendation(user_id, product_id))
            .await?;

        let response = match persisted {
            Some(row) => RecommendationEntry::from_ids(&row.product_ids()),
            None => {
                let products = self
                    .with_retry(|| self.generator.generate(user_id, product_id))
                    .await?;
                let response = RecommendationEntry::from_products(&products);

                let row = PersistedRecommendation::new(
                    user_id,
                    product_id,
                    &RecommendationEntry::ids(&response),
                );
                self.with_retry(|| self.store.save_recommendation(&row)).await?;
                tracing::info!(
                    "Persisted recommendations for user {} product {}",
                    user_id,
                    product_id
                );
                response
            }
        };

        // 4. Promotion
        if request_count > self.cache_threshold {
            self.with_retry(|| {
                self.cache
                    .set_recommendations(user_id, product_id, &response, self.cache_ttl)
            })
            .await?;
        }

        Ok(response)
    }

    /// Globally most liked products, independent of any user.
    pub async fn top3(&self) -> Result<Vec<RecommendationEntry>, ServiceError> {
        let products = self.with_retry(|| self.generator.top_liked()).await?;
        Ok(RecommendationEntry::from_products(&products))
    }
}
