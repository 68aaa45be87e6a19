pub mod cache;
pub mod db;
#[cfg(test)]
pub mod memory;
pub mod productdb;
pub mod recommendationdb;
