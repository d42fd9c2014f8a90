//! Storage seam shared by the SQLite and in-memory backends.

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    connection::Database,
    memory::MemoryStore,
    models::{Category, DuplicatePolicy, LabelEvent, LabelStats, Picture},
};

/// Durable home of pictures and label events on this device.
///
/// Implementations are single-writer: callers on one device share one
/// handle, and every method observes the writes of the ones before it.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Seed pictures when the picture table is empty; returns rows inserted.
    async fn bootstrap(&self, seed: Vec<Picture>) -> Result<usize>;

    async fn picture_count(&self) -> Result<u64>;

    /// Pictures `user_id` has not labeled, optionally of one seeded category.
    async fn unlabeled_pictures(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Picture>>;

    async fn category_counts(&self, user_id: &str) -> Result<HashMap<Category, u64>>;

    async fn insert_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
        policy: DuplicatePolicy,
    ) -> Result<LabelEvent>;

    async fn fetch_unsynced(&self, user_id: &str) -> Result<Vec<LabelEvent>>;

    async fn mark_synced(&self, label_ids: &[i64]) -> Result<usize>;

    async fn delete_label(&self, user_id: &str, picture_id: &str) -> Result<usize>;

    async fn label_stats(&self, user_id: &str) -> Result<LabelStats>;
}

#[async_trait]
impl LabelStore for Database {
    async fn bootstrap(&self, seed: Vec<Picture>) -> Result<usize> {
        self.seed_pictures(seed).await
    }

    async fn picture_count(&self) -> Result<u64> {
        Database::picture_count(self).await
    }

    async fn unlabeled_pictures(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Picture>> {
        self.get_unlabeled_pictures(user_id, category).await
    }

    async fn category_counts(&self, user_id: &str) -> Result<HashMap<Category, u64>> {
        self.get_category_counts(user_id).await
    }

    async fn insert_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
        policy: DuplicatePolicy,
    ) -> Result<LabelEvent> {
        Database::insert_label(self, user_id, picture_id, category, policy).await
    }

    async fn fetch_unsynced(&self, user_id: &str) -> Result<Vec<LabelEvent>> {
        self.get_unsynced_labels(user_id).await
    }

    async fn mark_synced(&self, label_ids: &[i64]) -> Result<usize> {
        self.mark_labels_synced(label_ids.to_vec()).await
    }

    async fn delete_label(&self, user_id: &str, picture_id: &str) -> Result<usize> {
        Database::delete_label(self, user_id, picture_id).await
    }

    async fn label_stats(&self, user_id: &str) -> Result<LabelStats> {
        self.get_label_stats(user_id).await
    }
}

/// Which `LabelStore` implementation to open at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

/// Open the configured backend. Failure here is fatal to startup.
pub fn open_store(kind: StorageKind, path: &Path) -> Result<Arc<dyn LabelStore>> {
    match kind {
        StorageKind::Sqlite => Ok(Arc::new(Database::open(path.to_path_buf())?)),
        StorageKind::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
