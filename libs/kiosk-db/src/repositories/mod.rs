pub mod allocator_repo;
pub mod buy_repo;
pub mod catalog_repo;
pub mod restock_repo;

pub use allocator_repo::PgAllocator;
pub use buy_repo::BuyRepository;
pub use catalog_repo::PgCatalog;
pub use restock_repo::RestockRepository;

use kiosk_core::StoreError;
use kiosk_core::models::Item;
use sqlx::Row;
use sqlx::postgres::PgRow;

/// Map driver errors onto the core taxonomy. Lock and serialization
/// failures become `ConcurrentAllocation` so the caller can re-check and
/// retry; everything else is transient from the core's point of view.
pub(crate) fn map_db_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // serialization_failure, deadlock_detected, lock_not_available
            Some("40001") | Some("40P01") | Some("55P03") => StoreError::ConcurrentAllocation,
            _ => StoreError::TransientStorage(e.to_string()),
        },
        _ => StoreError::TransientStorage(e.to_string()),
    }
}

pub(crate) fn row_to_item(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        subcategory_id: row.try_get("subcategory_id")?,
        price: row.try_get("price")?,
        description: row.try_get("description")?,
        private_data: row.try_get("private_data")?,
        is_sold: row.try_get("is_sold")?,
        sold_at: row.try_get("sold_at")?,
    })
}
