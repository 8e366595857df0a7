use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of a fiat price history.
///
/// Prices stay in the provider's string form; callers parse them when they
/// need arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: String,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: impl Into<String>) -> Self {
        Self {
            timestamp,
            price: price.into(),
        }
    }
}
