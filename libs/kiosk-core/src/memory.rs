//! In-memory storage boundary, honoring the same trait contracts as the
//! Postgres implementation. One mutex over the whole table set gives the
//! allocator its single-writer transaction; used by the state-machine tests
//! and anywhere a database is overkill.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::catalog::{CatalogStore, InventoryAllocator};
use crate::error::{StoreError, StoreResult};
use crate::models::{Allocation, Category, Item, RestockItem, Subcategory};
use crate::pagination;

#[derive(Debug, Default)]
struct Inner {
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
    items: Vec<Item>,
    buys: Vec<Buy>,
    next_item_id: i64,
    next_buy_id: i64,
}

#[derive(Debug, Clone)]
pub struct Buy {
    pub id: i64,
    pub buyer_id: i64,
    pub quantity: i64,
    pub total_price: i64,
    pub item_ids: Vec<i64>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::TransientStorage("store mutex poisoned".into()))
    }

    pub fn add_category(&self, name: &str) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.categories.iter().find(|c| c.name == name) {
            return Ok(existing.id);
        }
        let id = inner.categories.len() as i64 + 1;
        inner.categories.push(Category {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    pub fn add_subcategory(&self, name: &str) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.subcategories.iter().find(|s| s.name == name) {
            return Ok(existing.id);
        }
        let id = inner.subcategories.len() as i64 + 1;
        inner.subcategories.push(Subcategory {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    pub fn add_item(
        &self,
        category_id: i64,
        subcategory_id: i64,
        price: i64,
        description: &str,
        private_data: &str,
    ) -> StoreResult<i64> {
        let mut inner = self.lock()?;
        inner.next_item_id += 1;
        let id = inner.next_item_id;
        inner.items.push(Item {
            id,
            category_id,
            subcategory_id,
            price,
            description: description.to_string(),
            private_data: private_data.to_string(),
            is_sold: false,
            sold_at: None,
        });
        Ok(id)
    }

    /// Restock ingestion: get-or-create names, insert unsold items, return
    /// the inserted count.
    pub fn ingest(&self, batch: &[RestockItem]) -> StoreResult<usize> {
        for entry in batch {
            let category_id = self.add_category(&entry.category)?;
            let subcategory_id = self.add_subcategory(&entry.subcategory)?;
            self.add_item(
                category_id,
                subcategory_id,
                entry.price,
                &entry.description,
                &entry.private_data,
            )?;
        }
        Ok(batch.len())
    }

    pub fn buys(&self) -> StoreResult<Vec<Buy>> {
        Ok(self.lock()?.buys.clone())
    }

    pub fn item(&self, id: i64) -> StoreResult<Option<Item>> {
        Ok(self.lock()?.items.iter().find(|i| i.id == id).cloned())
    }
}

fn unsold<'a>(inner: &'a Inner, category_id: i64, subcategory_id: i64) -> Vec<&'a Item> {
    inner
        .items
        .iter()
        .filter(|i| {
            i.category_id == category_id && i.subcategory_id == subcategory_id && !i.is_sold
        })
        .collect()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn price_of(&self, category_id: i64, subcategory_id: i64) -> StoreResult<i64> {
        let inner = self.lock()?;
        unsold(&inner, category_id, subcategory_id)
            .first()
            .map(|i| i.price)
            .ok_or(StoreError::NotFound)
    }

    async fn available_quantity(&self, category_id: i64, subcategory_id: i64) -> StoreResult<i64> {
        let inner = self.lock()?;
        Ok(unsold(&inner, category_id, subcategory_id).len() as i64)
    }

    async fn first_unsold(&self, category_id: i64, subcategory_id: i64) -> StoreResult<Item> {
        let inner = self.lock()?;
        unsold(&inner, category_id, subcategory_id)
            .first()
            .map(|i| (*i).clone())
            .ok_or(StoreError::NotFound)
    }

    async fn category(&self, id: i64) -> StoreResult<Category> {
        let inner = self.lock()?;
        inner
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn subcategory(&self, id: i64) -> StoreResult<Subcategory> {
        let inner = self.lock()?;
        inner
            .subcategories
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn stocked_categories(&self, page: u32, page_size: u32) -> StoreResult<Vec<Category>> {
        let inner = self.lock()?;
        let mut stocked: Vec<Category> = inner
            .categories
            .iter()
            .filter(|c| inner.items.iter().any(|i| i.category_id == c.id && !i.is_sold))
            .cloned()
            .collect();
        stocked.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pagination::page_slice(&stocked, page as usize, page_size as usize).to_vec())
    }

    async fn stocked_subcategories(
        &self,
        category_id: i64,
        page: u32,
        page_size: u32,
    ) -> StoreResult<Vec<Subcategory>> {
        let inner = self.lock()?;
        let mut stocked: Vec<Subcategory> = inner
            .subcategories
            .iter()
            .filter(|s| !unsold(&inner, category_id, s.id).is_empty())
            .cloned()
            .collect();
        stocked.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pagination::page_slice(&stocked, page as usize, page_size as usize).to_vec())
    }

    async fn max_category_page(&self, page_size: u32) -> StoreResult<u32> {
        let inner = self.lock()?;
        let count = inner
            .categories
            .iter()
            .filter(|c| inner.items.iter().any(|i| i.category_id == c.id && !i.is_sold))
            .count();
        Ok(pagination::max_page(count as u64, page_size as u64))
    }

    async fn max_subcategory_page(&self, category_id: i64, page_size: u32) -> StoreResult<u32> {
        let inner = self.lock()?;
        let count = inner
            .subcategories
            .iter()
            .filter(|s| !unsold(&inner, category_id, s.id).is_empty())
            .count();
        Ok(pagination::max_page(count as u64, page_size as u64))
    }
}

#[async_trait]
impl InventoryAllocator for MemoryStore {
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
        // Check and mutation happen under one lock, so allocations are
        // serialized and `ConcurrentAllocation` cannot occur here.
        let mut inner = self.lock()?;
        let mut ids: Vec<i64> = unsold(&inner, category_id, subcategory_id)
            .iter()
            .map(|i| i.id)
            .collect();
        if (ids.len() as i64) < quantity {
            return Err(StoreError::InsufficientStock {
                available: ids.len() as i64,
            });
        }
        ids.sort_unstable();
        ids.truncate(quantity as usize);

        let now = Utc::now();
        let mut allocated = Vec::with_capacity(ids.len());
        for item in inner.items.iter_mut().filter(|i| ids.contains(&i.id)) {
            item.is_sold = true;
            item.sold_at = Some(now);
            allocated.push(item.clone());
        }
        let total_price = allocated.iter().map(|i| i.price).sum();

        inner.next_buy_id += 1;
        let buy_id = inner.next_buy_id;
        inner.buys.push(Buy {
            id: buy_id,
            buyer_id,
            quantity,
            total_price,
            item_ids: ids,
        });
        Ok(Allocation {
            buy_id,
            total_price,
            items: allocated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, i64, i64) {
        let store = MemoryStore::new();
        let cat = store.add_category("Accounts").unwrap();
        let sub = store.add_subcategory("Premium").unwrap();
        for n in 0..3 {
            store
                .add_item(cat, sub, 1000, "desc", &format!("secret-{n}"))
                .unwrap();
        }
        (store, cat, sub)
    }

    #[tokio::test]
    async fn reads_reflect_seeded_stock() {
        let (store, cat, sub) = seeded();
        assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 3);
        assert_eq!(store.price_of(cat, sub).await.unwrap(), 1000);
        assert_eq!(store.stocked_categories(0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn allocation_is_ordered_and_irreversible() {
        let (store, cat, sub) = seeded();
        let allocation = store.allocate(7, cat, sub, 2).await.unwrap();
        assert_eq!(allocation.items.len(), 2);
        assert_eq!(allocation.total_price, 2000);
        // Ascending id order.
        assert!(allocation.items[0].id < allocation.items[1].id);
        assert!(allocation.items.iter().all(|i| i.is_sold && i.sold_at.is_some()));
        assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn shortage_leaves_stock_untouched() {
        let (store, cat, sub) = seeded();
        let err = store.allocate(7, cat, sub, 5).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { available: 3 }));
        assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 3);
        assert!(store.buys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_creates_names_and_items() {
        let store = MemoryStore::new();
        let batch = vec![
            RestockItem {
                category: "Keys".into(),
                subcategory: "Game".into(),
                price: 500,
                description: "d".into(),
                private_data: "k1".into(),
            },
            RestockItem {
                category: "Keys".into(),
                subcategory: "Game".into(),
                price: 500,
                description: "d".into(),
                private_data: "k2".into(),
            },
        ];
        assert_eq!(store.ingest(&batch).unwrap(), 2);
        let cat = store.add_category("Keys").unwrap();
        let sub = store.add_subcategory("Game").unwrap();
        assert_eq!(store.available_quantity(cat, sub).await.unwrap(), 2);
    }
}
