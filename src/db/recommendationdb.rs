use async_trait::async_trait;

use crate::{
    db::{
        db::DBClient,
        productdb::{CatalogExt, LikeExt},
    },
    models::productmodel::PersistedRecommendation,
};

#[async_trait]
pub trait RecommendationExt: Send + Sync {
    async fn recommendation_exists(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error>;

    async fn get_recommendation(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<Option<PersistedRecommendation>, sqlx::Error>;

    /// Insert the row for the pair, or overwrite all three slots if one exists.
    async fn save_recommendation(
        &self,
        recommendation: &PersistedRecommendation,
    ) -> Result<(), sqlx::Error>;

    /// Overwrite all three slots of an existing row. Never creates a row;
    /// returns false when no row matched.
    async fn update_recommendation(
        &self,
        recommendation: &PersistedRecommendation,
    ) -> Result<bool, sqlx::Error>;
}

/// Everything the recommendation services need from the relational store.
pub trait RecoStore: CatalogExt + LikeExt + RecommendationExt {}

impl<T> RecoStore for T where T: CatalogExt + LikeExt + RecommendationExt {}

#[async_trait]
impl RecommendationExt for DBClient {
    async fn recommendation_exists(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM recommendations WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn get_recommendation(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<Option<PersistedRecommendation>, sqlx::Error> {
        let row = sqlx::query_as::<_, PersistedRecommendation>(
            r#"
            SELECT user_id, product_id, recommendation1, recommendation2, recommendation3
            FROM recommendations
            WHERE user_id = $1 AND product_id = $2
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn save_recommendation(
        &self,
        recommendation: &PersistedRecommendation,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO recommendations
                (user_id, product_id, recommendation1, recommendation2, recommendation3)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id) DO UPDATE
            SET recommendation1 = EXCLUDED.recommendation1,
                recommendation2 = EXCLUDED.recommendation2,
                recommendation3 = EXCLUDED.recommendation3
            "#,
        )
        .bind(recommendation.user_id)
        .bind(recommendation.product_id)
        .bind(recommendation.recommendation1)
        .bind(recommendation.recommendation2)
        .bind(recommendation.recommendation3)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_recommendation(
        &self,
        recommendation: &PersistedRecommendation,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE recommendations
            SET recommendation1 = $3, recommendation2 = $4, recommendation3 = $5
            WHERE user_id = $1 AND product_id = $2
            "#,
        )
        .bind(recommendation.user_id)
        .bind(recommendation.product_id)
        .bind(recommendation.recommendation1)
        .bind(recommendation.recommendation2)
        .bind(recommendation.recommendation3)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
