use async_trait::async_trait;
use sqlx::{PgPool, Row};

use kiosk_core::StoreResult;
use kiosk_core::catalog::CatalogStore;
use kiosk_core::error::StoreError;
use kiosk_core::models::{Category, Item, Subcategory};
use kiosk_core::pagination;

use super::{map_db_err, row_to_item};

/// Postgres catalog read model. All queries run against the latest committed
/// snapshot, unsynchronized with the allocator.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn price_of(&self, category_id: i64, subcategory_id: i64) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT price FROM items
             WHERE category_id = $1 AND subcategory_id = $2 AND is_sold = FALSE
             ORDER BY id LIMIT 1",
        )
        .bind(category_id)
        .bind(subcategory_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or(StoreError::NotFound)
    }

    async fn available_quantity(&self, category_id: i64, subcategory_id: i64) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM items
             WHERE category_id = $1 AND subcategory_id = $2 AND is_sold = FALSE",
        )
        .bind(category_id)
        .bind(subcategory_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn first_unsold(&self, category_id: i64, subcategory_id: i64) -> StoreResult<Item> {
        let row = sqlx::query(
            "SELECT * FROM items
             WHERE category_id = $1 AND subcategory_id = $2 AND is_sold = FALSE
             ORDER BY id LIMIT 1",
        )
        .bind(category_id)
        .bind(subcategory_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or(StoreError::NotFound)?;
        row_to_item(&row).map_err(map_db_err)
    }

    async fn category(&self, id: i64) -> StoreResult<Category> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or(StoreError::NotFound)?;
        Ok(Category {
            id: row.try_get("id").map_err(map_db_err)?,
            name: row.try_get("name").map_err(map_db_err)?,
        })
    }

    async fn subcategory(&self, id: i64) -> StoreResult<Subcategory> {
        let row = sqlx::query("SELECT id, name FROM subcategories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or(StoreError::NotFound)?;
        Ok(Subcategory {
            id: row.try_get("id").map_err(map_db_err)?,
            name: row.try_get("name").map_err(map_db_err)?,
        })
    }

    async fn stocked_categories(&self, page: u32, page_size: u32) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT c.id, c.name FROM categories c
             JOIN items i ON i.category_id = c.id
             WHERE i.is_sold = FALSE
             GROUP BY c.id, c.name
             ORDER BY c.name
             LIMIT $1 OFFSET $2",
        )
        .bind(page_size as i64)
        .bind(page as i64 * page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get("id").map_err(map_db_err)?,
                    name: row.try_get("name").map_err(map_db_err)?,
                })
            })
            .collect()
    }

    async fn stocked_subcategories(
        &self,
        category_id: i64,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<Subcategory>> {
        let rows = sqlx::query(
            "SELECT s.id, s.name FROM subcategories s
             JOIN items i ON i.subcategory_id = s.id
             WHERE i.category_id = $1 AND i.is_sold = FALSE
             GROUP BY s.id, s.name
             ORDER BY s.name
             LIMIT $2 OFFSET $3",
        )
        .bind(category_id)
        .bind(page_size as i64)
        .bind(page as i64 * page_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.iter()
            .map(|row| {
                Ok(Subcategory {
                    id: row.try_get("id").map_err(map_db_err)?,
                    name: row.try_get("name").map_err(map_db_err)?,
                })
            })
            .collect()
    }

    async fn max_category_page(&self, page_size: u32) -> StoreResult<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT category_id) FROM items WHERE is_sold = FALSE",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(pagination::max_page(count as u64, page_size as u64))
    }

    async fn max_subcategory_page(&self, category_id: i64, page_size: u32) -> StoreResult<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT subcategory_id) FROM items
             WHERE category_id = $1 AND is_sold = FALSE",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(pagination::max_page(count as u64, page_size as u64))
    }
}
