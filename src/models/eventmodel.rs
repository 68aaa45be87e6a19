use serde::{Deserialize, Serialize};

/// Kind of preference change carried on the product update feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Like,
    Unlike,
    /// Any action this service does not react to (catalog edits, views, ...).
    #[serde(other)]
    Other,
}

/// Payload published on the `product_updates` feed.
///
/// Producers send the product id as a string and attach extra catalog
/// fields; everything besides the three fields below is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEvent {
    pub action: EventAction,
    pub user_id: i32,
    pub product_id: String,
}

impl ProductEvent {
    pub fn parsed_product_id(&self) -> Option<i32> {
        self.product_id.trim().parse::<i32>().ok()
    }
}
