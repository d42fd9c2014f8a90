//! In-process `LabelStore` for platforms without an embedded database.
//!
//! Mirrors the SQLite backend row for row, including the unique
//! (user, picture) index and the foreign key on `picture_id`. Nothing
//! survives the process.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::{
    models::{Category, DuplicatePolicy, LabelEvent, LabelStats, Picture},
    store::LabelStore,
};
use crate::error::LabelError;

#[derive(Default)]
struct Tables {
    pictures: Vec<Picture>,
    labels: Vec<LabelEvent>,
    next_label_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl LabelStore for MemoryStore {
    async fn bootstrap(&self, seed: Vec<Picture>) -> Result<usize> {
        let mut tables = self.lock();
        if !tables.pictures.is_empty() {
            return Ok(0);
        }

        let mut seen = std::collections::HashSet::new();
        for picture in &seed {
            if !seen.insert(picture.picture_id.as_str()) {
                bail!("duplicate picture id {} in seed", picture.picture_id);
            }
        }

        let inserted = seed.len();
        tables.pictures = seed;
        log::info!("Seeded {inserted} pictures");
        Ok(inserted)
    }

    async fn picture_count(&self) -> Result<u64> {
        Ok(self.lock().pictures.len() as u64)
    }

    async fn unlabeled_pictures(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Picture>> {
        let tables = self.lock();
        let pictures = tables
            .pictures
            .iter()
            .filter(|p| category.map_or(true, |c| p.category == Some(c)))
            .filter(|p| {
                !tables
                    .labels
                    .iter()
                    .any(|l| l.user_id == user_id && l.picture_id == p.picture_id)
            })
            .cloned()
            .collect();
        Ok(pictures)
    }

    async fn category_counts(&self, user_id: &str) -> Result<HashMap<Category, u64>> {
        let tables = self.lock();
        let mut counts = HashMap::new();
        for label in tables.labels.iter().filter(|l| l.user_id == user_id) {
            *counts.entry(label.category).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
        policy: DuplicatePolicy,
    ) -> Result<LabelEvent> {
        if category.is_sentinel() {
            bail!("refusing to store menu sentinel {category} as a label");
        }

        let mut tables = self.lock();
        if !tables.pictures.iter().any(|p| p.picture_id == picture_id) {
            return Err(LabelError::UnknownPicture(picture_id.to_string()).into());
        }

        let now = Utc::now();
        let existing = tables
            .labels
            .iter()
            .position(|l| l.user_id == user_id && l.picture_id == picture_id);
        if let Some(index) = existing {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(LabelError::AlreadyLabeled {
                        user_id: user_id.to_string(),
                        picture_id: picture_id.to_string(),
                    }
                    .into())
                }
                // Same as SQLite: the replacement gets a fresh label_id.
                DuplicatePolicy::Overwrite => {
                    tables.labels.remove(index);
                }
            }
        }

        tables.next_label_id += 1;
        let event = LabelEvent {
            label_id: tables.next_label_id,
            user_id: user_id.to_string(),
            picture_id: picture_id.to_string(),
            category,
            synced: false,
            created_at: now,
        };
        tables.labels.push(event.clone());
        Ok(event)
    }

    async fn fetch_unsynced(&self, user_id: &str) -> Result<Vec<LabelEvent>> {
        let tables = self.lock();
        Ok(tables
            .labels
            .iter()
            .filter(|l| l.user_id == user_id && !l.synced)
            .cloned()
            .collect())
    }

    async fn mark_synced(&self, label_ids: &[i64]) -> Result<usize> {
        let mut tables = self.lock();
        let mut updated = 0;
        for label in tables
            .labels
            .iter_mut()
            .filter(|l| label_ids.contains(&l.label_id))
        {
            label.synced = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_label(&self, user_id: &str, picture_id: &str) -> Result<usize> {
        let mut tables = self.lock();
        let before = tables.labels.len();
        tables
            .labels
            .retain(|l| !(l.user_id == user_id && l.picture_id == picture_id));
        Ok(before - tables.labels.len())
    }

    async fn label_stats(&self, user_id: &str) -> Result<LabelStats> {
        let tables = self.lock();
        let mine = tables.labels.iter().filter(|l| l.user_id == user_id);
        let (labeled, unsynced) = mine.fold((0u64, 0u64), |(all, pending), l| {
            (all + 1, pending + u64::from(!l.synced))
        });
        Ok(LabelStats {
            pictures: tables.pictures.len() as u64,
            labeled,
            unsynced,
        })
    }
}
