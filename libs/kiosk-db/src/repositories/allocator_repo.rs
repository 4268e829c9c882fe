use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use kiosk_core::StoreResult;
use kiosk_core::catalog::InventoryAllocator;
use kiosk_core::error::StoreError;
use kiosk_core::models::{Allocation, Item};

use super::{map_db_err, row_to_item};

/// Postgres inventory allocator. The whole claim runs in one transaction:
/// row locks on the selected items guarantee two concurrent allocations can
/// never mark the same item sold, and the UNIQUE constraint on
/// `buy_items.item_id` backs that up at the schema level.
#[derive(Debug, Clone)]
pub struct PgAllocator {
    pool: PgPool,
}

impl PgAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryAllocator for PgAllocator {
    async fn allocate(
        &self,
        buyer_id: i64,
        category_id: i64,
        subcategory_id: i64,
        quantity: i64,
    ) -> StoreResult<Allocation> {
        if quantity <= 0 {
            return Err(StoreError::Precondition("quantity must be positive"));
        }

        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        // SKIP LOCKED: rows already claimed by a concurrent allocation are
        // passed over instead of blocking on them.
        let rows = sqlx::query(
            "SELECT * FROM items
             WHERE category_id = $1 AND subcategory_id = $2 AND is_sold = FALSE
             ORDER BY id
             LIMIT $3
             FOR UPDATE SKIP LOCKED",
        )
        .bind(category_id)
        .bind(subcategory_id)
        .bind(quantity)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_db_err)?;

        if (rows.len() as i64) < quantity {
            tx.rollback().await.ok();
            // Too few rows locked: either the stock is genuinely short, or a
            // concurrent transaction is holding some of it. Distinguish via
            // the committed count so the caller knows whether to retry.
            let available = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM items
                 WHERE category_id = $1 AND subcategory_id = $2 AND is_sold = FALSE",
            )
            .bind(category_id)
            .bind(subcategory_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
            if available >= quantity {
                return Err(StoreError::ConcurrentAllocation);
            }
            return Err(StoreError::InsufficientStock { available });
        }

        let mut items: Vec<Item> = rows
            .iter()
            .map(|row| row_to_item(row).map_err(map_db_err))
            .collect::<StoreResult<_>>()?;
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        let total_price: i64 = items.iter().map(|i| i.price).sum();
        let sold_at = Utc::now();

        let buy_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO buys (buyer_id, quantity, total_price) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(buyer_id)
        .bind(quantity)
        .bind(total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;

        sqlx::query("UPDATE items SET is_sold = TRUE, sold_at = $1 WHERE id = ANY($2)")
            .bind(sold_at)
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        sqlx::query("INSERT INTO buy_items (buy_id, item_id) SELECT $1, UNNEST($2::BIGINT[])")
            .bind(buy_id)
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;

        tx.commit().await.map_err(map_db_err)?;

        for item in &mut items {
            item.is_sold = true;
            item.sold_at = Some(sold_at);
        }
        info!(buy_id, buyer_id, quantity, total_price, "allocated items");
        Ok(Allocation {
            buy_id,
            total_price,
            items,
        })
    }
}
