mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod models;
mod routes;
mod service;

use std::{str::FromStr, sync::Arc, time::Duration};

use config::{Config, FeedKind};
use db::{
    cache::{CacheClient, RecoCache},
    db::DBClient,
    recommendationdb::RecoStore,
};
use dotenv::dotenv;
use routes::create_router;
use service::{
    error::FeedError,
    event_invalidator::EventInvalidator,
    event_source::{EventSource, RedisEventSource},
    kafka_source::KafkaEventSource,
    recommendation_service::RecommendationService,
    retry::RetryPolicy,
};
use tokio::sync::watch;
use tracing_subscriber::filter::LevelFilter;

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub store: Arc<dyn RecoStore>,
    pub cache: RecoCache,
    pub recommendation_service: Arc<RecommendationService>,
}

impl AppState {
    pub fn new(env: Config, store: Arc<dyn RecoStore>, cache: RecoCache) -> Self {
        let recommendation_service = Arc::new(RecommendationService::new(
            store.clone(),
            cache.clone(),
            env.cache_threshold,
            env.cache_ttl_secs,
            RetryPolicy::default(),
        ));

        AppState {
            env,
            store,
            cache,
            recommendation_service,
        }
    }
}

async fn connect_event_source(config: &Config) -> Result<Arc<dyn EventSource>, FeedError> {
    match config.event_source {
        FeedKind::Kafka => Ok(Arc::new(KafkaEventSource::new(
            &config.kafka_broker,
            &config.kafka_group_id,
            &config.event_topic,
        )?)),
        FeedKind::Redis => {
            // BLMOVE parks its connection, so the feed gets its own.
            let feed_client = CacheClient::connect(&config.redis_url).await?;
            Ok(Arc::new(RedisEventSource::new(
                feed_client.connection(),
                &config.event_topic,
            )))
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("🔥 Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::DEBUG))
        .init();

    let db_client = match DBClient::connect(
        &config.database_url,
        config.db_max_connections,
        config.db_min_connections,
        Duration::from_secs(config.db_acquire_timeout_secs),
    )
    .await
    {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if config.run_migrations {
        if let Err(err) = db_client.run_migrations().await {
            tracing::error!("🔥 Failed to run migrations: {:?}", err);
            std::process::exit(1);
        }
    }

    let cache_client = match CacheClient::connect(&config.redis_url).await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("🔥 Failed to connect to Redis: {:?}", err);
            std::process::exit(1);
        }
    };

    let event_source = match connect_event_source(&config).await {
        Ok(source) => source,
        Err(err) => {
            tracing::error!("🔥 Failed to open the product update feed: {:?}", err);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn RecoStore> = Arc::new(db_client);
    let cache = RecoCache::new(Arc::new(cache_client));
    let app_state = Arc::new(AppState::new(config.clone(), store.clone(), cache.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let invalidator = EventInvalidator::new(store, cache, event_source, RetryPolicy::default());
    let consumer = tokio::spawn(async move {
        invalidator.run_forever(shutdown_rx).await;
    });

    let app = create_router(app_state);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("🔥 Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {:?}", err);
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(err) = server.await {
        tracing::error!("Server error: {:?}", err);
    }

    if let Err(err) = consumer.await {
        tracing::error!("Event consumer task failed: {:?}", err);
    }
}
