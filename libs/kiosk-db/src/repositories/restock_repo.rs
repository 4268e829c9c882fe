use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use kiosk_core::models::RestockItem;

/// Restock ingestion boundary: categories and subcategories are created by
/// name on first use, new items always land unsold.
#[derive(Debug, Clone)]
pub struct RestockRepository {
    pool: PgPool,
}

impl RestockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ingest(&self, batch: &[RestockItem]) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open restock transaction")?;

        for entry in batch {
            // DO UPDATE instead of DO NOTHING so RETURNING always yields the id.
            let category_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO categories (name) VALUES ($1)
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                 RETURNING id",
            )
            .bind(&entry.category)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to upsert category")?;

            let subcategory_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO subcategories (name) VALUES ($1)
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                 RETURNING id",
            )
            .bind(&entry.subcategory)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to upsert subcategory")?;

            sqlx::query(
                "INSERT INTO items (category_id, subcategory_id, price, description, private_data)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(category_id)
            .bind(subcategory_id)
            .bind(entry.price)
            .bind(&entry.description)
            .bind(&entry.private_data)
            .execute(&mut *tx)
            .await
            .context("Failed to insert item")?;
        }

        tx.commit()
            .await
            .context("Failed to commit restock transaction")?;
        info!(count = batch.len(), "restock batch ingested");
        Ok(batch.len())
    }
}
