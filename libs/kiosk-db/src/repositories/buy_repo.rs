use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use kiosk_core::models::Item;
use kiosk_core::pagination;

use super::row_to_item;

#[derive(Debug, Clone)]
pub struct SalesStats {
    pub buys: i64,
    pub items_sold: i64,
    pub revenue: i64,
}

#[derive(Debug, Clone)]
pub struct BuyRecord {
    pub id: i64,
    pub quantity: i64,
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BuyRepository {
    pool: PgPool,
}

impl BuyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn stats_since(&self, since: DateTime<Utc>) -> Result<SalesStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS buys,
                    COALESCE(SUM(quantity), 0) AS items_sold,
                    COALESCE(SUM(total_price), 0) AS revenue
             FROM buys WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to fetch sales stats")?;
        Ok(SalesStats {
            buys: row.try_get("buys")?,
            items_sold: row.try_get("items_sold")?,
            revenue: row.try_get("revenue")?,
        })
    }

    /// One page of the buyer's history, newest first.
    pub async fn history_for_buyer(
        &self,
        buyer_id: i64,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<BuyRecord>> {
        let rows = sqlx::query(
            "SELECT id, quantity, total_price, created_at FROM buys
             WHERE buyer_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(buyer_id)
        .bind(page_size as i64)
        .bind(page as i64 * page_size as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch purchase history")?;
        rows.iter()
            .map(|row| {
                Ok(BuyRecord {
                    id: row.try_get("id")?,
                    quantity: row.try_get("quantity")?,
                    total_price: row.try_get("total_price")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn max_history_page(&self, buyer_id: i64, page_size: u32) -> Result<u32> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM buys WHERE buyer_id = $1")
            .bind(buyer_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count purchase history")?;
        Ok(pagination::max_page(total as u64, page_size as u64))
    }

    /// Items delivered for a past buy, so the profile flow can re-show
    /// purchased secrets.
    pub async fn items_by_buy(&self, buy_id: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT i.* FROM items i
             JOIN buy_items bi ON bi.item_id = i.id
             WHERE bi.buy_id = $1
             ORDER BY i.id",
        )
        .bind(buy_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch items for buy")?;
        rows.iter()
            .map(|row| row_to_item(row).context("Failed to map item row"))
            .collect()
    }
}
