use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Number of product ids a recommendation carries.
pub const RECOMMENDATION_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: i32,
    pub category: String,
    pub likes: i32,
}

/// Durable recommendation triple for a (user, product) pair.
///
/// Slots are filled left to right; a trailing slot is `None` only when the
/// catalog held fewer than three products at computation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct PersistedRecommendation {
    pub user_id: i32,
    pub product_id: i32,
    pub recommendation1: Option<i32>,
    pub recommendation2: Option<i32>,
    pub recommendation3: Option<i32>,
}

impl PersistedRecommendation {
    pub fn new(user_id: i32, product_id: i32, ids: &[i32]) -> Self {
        let slot = |i: usize| ids.get(i).copied();
        PersistedRecommendation {
            user_id,
            product_id,
            recommendation1: slot(0),
            recommendation2: slot(1),
            recommendation3: slot(2),
        }
    }

    /// Stored ids in slot order, empty slots skipped.
    pub fn product_ids(&self) -> Vec<i32> {
        [self.recommendation1, self.recommendation2, self.recommendation3]
            .into_iter()
            .flatten()
            .collect()
    }
}
