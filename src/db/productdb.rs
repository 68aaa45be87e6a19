use async_trait::async_trait;

use crate::{db::db::DBClient, models::productmodel::Product};

/// Catalog and preference reads used by the recommendation generator.
///
/// "Top" always means descending like count; equal counts fall back to
/// ascending product id so repeated reads return the same order.
#[async_trait]
pub trait CatalogExt: Send + Sync {
    async fn get_product(&self, product_id: i32) -> Result<Option<Product>, sqlx::Error>;

    async fn get_product_category(&self, product_id: i32) -> Result<Option<String>, sqlx::Error>;

    async fn is_product_liked(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error>;

    async fn get_top_products_by_category(
        &self,
        category: &str,
        limit: i64,
    ) -> Result<Vec<Product>, sqlx::Error>;

    async fn get_top_liked_products(&self, limit: i64) -> Result<Vec<Product>, sqlx::Error>;

    /// Categories of the products a user likes, most liked category first.
    async fn get_liked_categories(&self, user_id: i32) -> Result<Vec<String>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Mirror of the external like relation, written only from the event feed.
#[async_trait]
pub trait LikeExt: Send + Sync {
    /// Returns false when the like already existed.
    async fn add_like(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error>;

    /// Returns false when there was nothing to remove.
    async fn remove_like(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error>;
}

#[async_trait]
impl CatalogExt for DBClient {
    async fn get_product(&self, product_id: i32) -> Result<Option<Product>, sqlx::Error> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, category, likes
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn get_product_category(&self, product_id: i32) -> Result<Option<String>, sqlx::Error> {
        let category = sqlx::query_scalar::<_, String>(
            "SELECT category FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn is_product_liked(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        let liked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(liked)
    }

    async fn get_top_products_by_category(
        &self,
        category: &str,
        limit: i64,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, category, likes
            FROM products
            WHERE category = $1
            ORDER BY likes DESC, id ASC
            LIMIT $2
            "#,
        )
        .bind(category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn get_top_liked_products(&self, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, category, likes
            FROM products
            ORDER BY likes DESC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn get_liked_categories(&self, user_id: i32) -> Result<Vec<String>, sqlx::Error> {
        let categories = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.category
            FROM products p
            JOIN likes l ON p.id = l.product_id
            WHERE l.user_id = $1
            GROUP BY p.category
            ORDER BY COUNT(l.product_id) DESC, p.category ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LikeExt for DBClient {
    async fn add_like(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        // Redelivered events must not trip the unique constraint.
        let result = sqlx::query(
            r#"
            INSERT INTO likes (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_like(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
