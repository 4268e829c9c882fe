//! Storage boundary consumed by the navigation state machine.
//!
//! Reads run against the latest committed snapshot and may be slightly stale;
//! availability is re-validated inside [`InventoryAllocator::allocate`], the
//! only operation that mutates the item table.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Allocation, Category, Item, Subcategory};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Price (minor units) of the first unsold item in the bucket.
    /// Fails with `NotFound` when the bucket is empty; callers pre-check
    /// availability but must still handle the race.
    async fn price_of(&self, category_id: i64, subcategory_id: i64) -> StoreResult<i64>;

    async fn available_quantity(&self, category_id: i64, subcategory_id: i64) -> StoreResult<i64>;

    /// First unsold item of the bucket, for description/price display.
    async fn first_unsold(&self, category_id: i64, subcategory_id: i64) -> StoreResult<Item>;

    async fn category(&self, id: i64) -> StoreResult<Category>;

    async fn subcategory(&self, id: i64) -> StoreResult<Subcategory>;

    /// Categories with at least one unsold item, distinct, ordered by name.
    async fn stocked_categories(&self, page: u32, page_size: u32) -> StoreResult<Vec<Category>>;

    /// Subcategories with at least one unsold item under the category,
    /// distinct, ordered by name.
    async fn stocked_subcategories(
        &self,
        category_id: i64,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<Subcategory>>;

    async fn max_category_page(&self, page_size: u32) -> StoreResult<u32>;

    async fn max_subcategory_page(&self, category_id: i64, page_size: u32) -> StoreResult<u32>;
}

#[async_trait]
pub trait InventoryAllocator: Send + Sync {
    /// Atomically mark `quantity` unsold items of the bucket as sold
    /// (ascending id, so allocation order is deterministic) and record the
    /// buy association.
    ///
    /// Fails with `InsufficientStock` and no mutation when fewer than
    /// `quantity` items are available, or `ConcurrentAllocation` when the
    /// transaction lost a race; callers re-check availability before
    /// retrying. Two concurrent allocations can never claim the same item.
    async fn allocate(
        &self,
        buyer_id: i64,
        category_id: i64,
        subcategory_id: i64,
        quantity: i64,
    ) -> StoreResult<Allocation>;
}
