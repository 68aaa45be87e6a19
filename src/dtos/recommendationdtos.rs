use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::productmodel::Product;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RecommendationRequestDto {
    #[validate(range(min = 1, message = "user_id must be a positive integer"))]
    pub user_id: i32,

    #[validate(range(min = 1, message = "product_id must be a positive integer"))]
    pub product_id: i32,
}

/// One recommended product as returned to callers and stored in the cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationEntry {
    pub id: i32,
}

impl RecommendationEntry {
    pub fn from_ids(ids: &[i32]) -> Vec<RecommendationEntry> {
        ids.iter().map(|&id| RecommendationEntry { id }).collect()
    }

    pub fn from_products(products: &[Product]) -> Vec<RecommendationEntry> {
        products.iter().map(|p| RecommendationEntry { id: p.id }).collect()
    }

    pub fn ids(entries: &[RecommendationEntry]) -> Vec<i32> {
        entries.iter().map(|e| e.id).collect()
    }
}
