pub mod error;
pub mod event_invalidator;
pub mod event_source;
pub mod generator;
pub mod kafka_source;
pub mod recommendation_service;
pub mod retry;
