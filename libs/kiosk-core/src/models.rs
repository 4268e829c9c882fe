use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subcategory {
    pub id: i64,
    pub name: String,
}

/// A single sellable unit. `private_data` is the secret delivered to the
/// buyer and must never appear on any screen before allocation succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub category_id: i64,
    pub subcategory_id: i64,
    /// Price in minor currency units (cents).
    pub price: i64,
    pub description: String,
    pub private_data: String,
    pub is_sold: bool,
    pub sold_at: Option<DateTime<Utc>>,
}

/// Result of a successful inventory allocation: the buy row plus the exact
/// item rows that were marked sold for it.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub buy_id: i64,
    pub total_price: i64,
    pub items: Vec<Item>,
}

/// One entry of a restock ingestion batch.
#[derive(Debug, Clone, Deserialize)]
pub struct RestockItem {
    pub category: String,
    pub subcategory: String,
    pub price: i64,
    pub description: String,
    pub private_data: String,
}

#[derive(Debug, Deserialize)]
pub struct RestockBatch {
    pub items: Vec<RestockItem>,
}

/// Render minor currency units as "major.minor".
pub fn format_minor(amount: i64) -> String {
    format!("{}.{:02}", amount / 100, amount % 100)
}

#[cfg(test)]
mod tests {
    use super::format_minor;

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_minor(0), "0.00");
        assert_eq!(format_minor(5), "0.05");
        assert_eq!(format_minor(1999), "19.99");
        assert_eq!(format_minor(100000), "1000.00");
    }
}
