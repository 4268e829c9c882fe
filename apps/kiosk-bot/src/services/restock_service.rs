use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use kiosk_core::models::RestockBatch;
use kiosk_db::repositories::RestockRepository;

#[derive(Debug, Clone)]
pub struct RestockOutcome {
    pub count: usize,
    /// (category, subcategory) -> inserted item count, for the announcement.
    pub by_bucket: BTreeMap<(String, String), usize>,
}

#[derive(Clone)]
pub struct RestockService {
    repo: RestockRepository,
}

impl RestockService {
    pub fn new(repo: RestockRepository) -> Self {
        Self { repo }
    }

    /// Read a restock batch from a server-local JSON file, ingest it, then
    /// remove the file so secrets don't linger on disk.
    pub async fn ingest_from_file(&self, path: &str) -> Result<RestockOutcome> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read restock file {path}"))?;
        let batch: RestockBatch =
            serde_json::from_str(&raw).context("Failed to parse restock batch")?;

        let count = self.repo.ingest(&batch.items).await?;

        let mut by_bucket: BTreeMap<(String, String), usize> = BTreeMap::new();
        for item in &batch.items {
            *by_bucket
                .entry((item.category.clone(), item.subcategory.clone()))
                .or_default() += 1;
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            info!("Could not remove restock file {}: {}", path, e);
        }

        Ok(RestockOutcome { count, by_bucket })
    }
}
