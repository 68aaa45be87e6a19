// db/db.rs
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

/// PostgreSQL side of the persistence gateway.
#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("size", &self.pool.size())
            .finish()
    }
}

impl DBClient {
    /// Open a pool and verify the database answers before returning.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        tracing::info!(
            "✅ Connection to the database is successful (max: {}, min: {})",
            max_connections,
            min_connections
        );

        Ok(DBClient { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

/// Live database for `#[ignore]` tests: `DATABASE_URL=... cargo test -- --ignored`
#[cfg(test)]
pub async fn test_client() -> DBClient {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let client = DBClient::connect(&url, 2, 0, Duration::from_secs(5))
        .await
        .unwrap();
    client.run_migrations().await.unwrap();
    client
}
