use std::sync::Arc;

use crate::{
    db::recommendationdb::RecoStore,
    models::productmodel::{Product, RECOMMENDATION_COUNT},
};

/// Rule-based recommendation generator.
///
/// Reads catalog and preference data only; the same inputs over unchanged
/// data always produce the same ordered list.
#[derive(Clone)]
pub struct RecommendationGenerator {
    store: Arc<dyn RecoStore>,
}

impl RecommendationGenerator {
    pub fn new(store: Arc<dyn RecoStore>) -> Self {
        Self { store }
    }

    /// Up to three products for the pair. Fewer only when the whole catalog
    /// holds fewer than three products.
    pub async fn generate(&self, user_id: i32, product_id: i32) -> Result<Vec<Product>, sqlx::Error> {
        let mut result = if self.store.is_product_liked(user_id, product_id).await? {
            self.for_liked_product(product_id).await?
        } else {
            self.for_unliked_product(user_id).await?
        };

        if result.len() < RECOMMENDATION_COUNT {
            let top = self.top_liked().await?;
            pad_distinct(&mut result, top);
        }

        tracing::debug!(
            "Generated {} recommendations for user {} product {}",
            result.len(),
            user_id,
            product_id
        );
        Ok(result)
    }

    /// Global top-liked products, also served by the top3 endpoint.
    pub async fn top_liked(&self) -> Result<Vec<Product>, sqlx::Error> {
        self.store
            .get_top_liked_products(RECOMMENDATION_COUNT as i64)
            .await
    }

    async fn for_liked_product(&self, product_id: i32) -> Result<Vec<Product>, sqlx::Error> {
        let category = match self.store.get_product_category(product_id).await? {
            Some(category) => category,
            None => return self.top_liked().await,
        };

        let products = self
            .store
            .get_top_products_by_category(&category, RECOMMENDATION_COUNT as i64)
            .await?;

        if products.is_empty() {
            return self.top_liked().await;
        }
        Ok(products)
    }

    async fn for_unliked_product(&self, user_id: i32) -> Result<Vec<Product>, sqlx::Error> {
        let categories = self.store.get_liked_categories(user_id).await?;
        if categories.is_empty() {
            return self.top_liked().await;
        }

        let mut result: Vec<Product> = Vec::with_capacity(RECOMMENDATION_COUNT);
        for category in categories {
            let products = self
                .store
                .get_top_products_by_category(&category, RECOMMENDATION_COUNT as i64)
                .await?;
            pad_distinct(&mut result, products);
            if result.len() >= RECOMMENDATION_COUNT {
                break;
            }
        }
        Ok(result)
    }
}

/// Append candidates not already present until the list is full.
fn pad_distinct(result: &mut Vec<Product>, candidates: Vec<Product>) {
    for product in candidates {
        if result.len() >= RECOMMENDATION_COUNT {
            break;
        }
        if !result.iter().any(|p| p.id == product.id) {
            result.push(product);
        }
    }
}
