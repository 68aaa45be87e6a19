//! In-process stand-ins for PostgreSQL and Redis used by unit tests.
//!
//! Ordering rules mirror the SQL in `productdb.rs`: likes descending, then
//! id ascending; liked categories by count descending, then name ascending.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    db::{
        cache::KeyValueStore,
        productdb::{CatalogExt, LikeExt},
        recommendationdb::RecommendationExt,
    },
    models::productmodel::{PersistedRecommendation, Product},
    service::{error::FeedError, event_source::EventSource},
};

pub fn product(id: i32, category: &str, likes: i32) -> Product {
    Product {
        id,
        name: format!("product {}", id),
        description: String::new(),
        price: 100,
        category: category.to_string(),
        likes,
    }
}

fn io_failure() -> sqlx::Error {
    sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "store unavailable",
    ))
}

#[derive(Default)]
struct StoreState {
    products: Vec<Product>,
    likes: HashSet<(i32, i32)>,
    recommendations: HashMap<(i32, i32), PersistedRecommendation>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    failing: AtomicBool,
    /// Calls into the store that fail before succeeding again.
    transient_failures: AtomicUsize,
    catalog_reads: AtomicUsize,
    recommendation_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn with_products(products: Vec<Product>) -> Self {
        let store = MemoryStore::default();
        store.state.lock().unwrap().products = products;
        store
    }

    pub fn like(&self, user_id: i32, product_id: i32) {
        self.state.lock().unwrap().likes.insert((user_id, product_id));
    }

    pub fn is_liked(&self, user_id: i32, product_id: i32) -> bool {
        self.state.lock().unwrap().likes.contains(&(user_id, product_id))
    }

    pub fn set_likes(&self, product_id: i32, likes: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.products.iter_mut().find(|p| p.id == product_id) {
            p.likes = likes;
        }
    }

    pub fn insert_recommendation(&self, row: PersistedRecommendation) {
        self.state
            .lock()
            .unwrap()
            .recommendations
            .insert((row.user_id, row.product_id), row);
    }

    pub fn recommendation(&self, user_id: i32, product_id: i32) -> Option<PersistedRecommendation> {
        self.state
            .lock()
            .unwrap()
            .recommendations
            .get(&(user_id, product_id))
            .cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next(&self, calls: usize) {
        self.transient_failures.store(calls, Ordering::SeqCst);
    }

    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    pub fn recommendation_reads(&self) -> usize {
        self.recommendation_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("store rejected the query".to_string()));
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(io_failure());
        }
        Ok(())
    }

    fn catalog_read(&self) -> Result<(), sqlx::Error> {
        self.check()?;
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn ranked(mut products: Vec<Product>, limit: i64) -> Vec<Product> {
        products.sort_by(|a, b| b.likes.cmp(&a.likes).then(a.id.cmp(&b.id)));
        products.truncate(limit.max(0) as usize);
        products
    }
}

#[async_trait]
impl CatalogExt for MemoryStore {
    async fn get_product(&self, product_id: i32) -> Result<Option<Product>, sqlx::Error> {
        self.catalog_read()?;
        let state = self.state.lock().unwrap();
        Ok(state.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn get_product_category(&self, product_id: i32) -> Result<Option<String>, sqlx::Error> {
        self.catalog_read()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.category.clone()))
    }

    async fn is_product_liked(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        self.catalog_read()?;
        Ok(self.is_liked(user_id, product_id))
    }

    async fn get_top_products_by_category(
        &self,
        category: &str,
        limit: i64,
    ) -> Result<Vec<Product>, sqlx::Error> {
        self.catalog_read()?;
        let state = self.state.lock().unwrap();
        let products = state
            .products
            .iter()
            .filter(|p| p.category == category)
            .cloned()
            .collect();
        Ok(Self::ranked(products, limit))
    }

    async fn get_top_liked_products(&self, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        self.catalog_read()?;
        let state = self.state.lock().unwrap();
        Ok(Self::ranked(state.products.clone(), limit))
    }

    async fn get_liked_categories(&self, user_id: i32) -> Result<Vec<String>, sqlx::Error> {
        self.catalog_read()?;
        let state = self.state.lock().unwrap();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_, product_id) in state.likes.iter().filter(|(u, _)| *u == user_id) {
            if let Some(p) = state.products.iter().find(|p| p.id == *product_id) {
                *counts.entry(p.category.clone()).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(ranked.into_iter().map(|(category, _)| category).collect())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.check()
    }
}

#[async_trait]
impl LikeExt for MemoryStore {
    async fn add_like(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        self.check()?;
        Ok(self.state.lock().unwrap().likes.insert((user_id, product_id)))
    }

    async fn remove_like(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        self.check()?;
        Ok(self.state.lock().unwrap().likes.remove(&(user_id, product_id)))
    }
}

#[async_trait]
impl RecommendationExt for MemoryStore {
    async fn recommendation_exists(&self, user_id: i32, product_id: i32) -> Result<bool, sqlx::Error> {
        self.check()?;
        self.recommendation_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.recommendation(user_id, product_id).is_some())
    }

    async fn get_recommendation(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<Option<PersistedRecommendation>, sqlx::Error> {
        self.check()?;
        self.recommendation_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.recommendation(user_id, product_id))
    }

    async fn save_recommendation(
        &self,
        recommendation: &PersistedRecommendation,
    ) -> Result<(), sqlx::Error> {
        self.check()?;
        self.insert_recommendation(recommendation.clone());
        Ok(())
    }

    async fn update_recommendation(
        &self,
        recommendation: &PersistedRecommendation,
    ) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let key = (recommendation.user_id, recommendation.product_id);
        match state.recommendations.get_mut(&key) {
            Some(row) => {
                *row = recommendation.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Key-value store with TTL bookkeeping instead of real expiry.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, (String, Option<usize>)>>,
    failing: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn ttl_of(&self, key: &str) -> Option<usize> {
        self.entries.lock().unwrap().get(key).and_then(|(_, ttl)| *ttl)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), redis::RedisError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(redis::RedisError::from((
                redis::ErrorKind::ResponseError,
                "cache rejected the command",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: usize) -> Result<(), redis::RedisError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Some(ttl_seconds)));
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, redis::RedisError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| ("0".to_string(), None));
        let next = entry.0.parse::<i64>().unwrap_or(0) + 1;
        entry.0 = next.to_string();
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<bool, redis::RedisError> {
        self.check()?;
        Ok(true)
    }
}

/// Feed backed by a deque; records acknowledged and rejected payloads.
#[derive(Default)]
pub struct MemoryEventSource {
    queue: Mutex<VecDeque<String>>,
    acked: Mutex<Vec<String>>,
    rejected: Mutex<Vec<(String, String)>>,
    receive_errors: AtomicUsize,
}

impl MemoryEventSource {
    pub fn push(&self, payload: &str) {
        self.queue.lock().unwrap().push_back(payload.to_string());
    }

    pub fn fail_next_receives(&self, count: usize) {
        self.receive_errors.store(count, Ordering::SeqCst);
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    pub fn rejected(&self) -> Vec<(String, String)> {
        self.rejected.lock().unwrap().clone()
    }

    pub fn is_drained(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn recover_pending(&self) -> Result<usize, FeedError> {
        Ok(0)
    }

    async fn receive(&self) -> Result<Option<String>, FeedError> {
        let pending = self.receive_errors.load(Ordering::SeqCst);
        if pending > 0 {
            self.receive_errors.store(pending - 1, Ordering::SeqCst);
            return Err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "feed connection dropped",
            ))
            .into());
        }
        let next = self.queue.lock().unwrap().pop_front();
        if next.is_none() {
            // Mimic the blocking pop timing out on an idle feed.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        Ok(next)
    }

    async fn ack(&self, payload: &str) -> Result<(), FeedError> {
        self.acked.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    async fn reject(&self, payload: &str, reason: &str) -> Result<(), FeedError> {
        self.rejected
            .lock()
            .unwrap()
            .push((payload.to_string(), reason.to_string()));
        Ok(())
    }
}
