use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;

use crate::db::{Category, DuplicatePolicy, LabelEvent, LabelStore};

/// Writes labels to the local store.
///
/// Menu sentinels are dropped here so navigation never shows up as a label.
pub struct LabelRecorder {
    store: Arc<dyn LabelStore>,
    policy: DuplicatePolicy,
}

impl LabelRecorder {
    pub fn new(store: Arc<dyn LabelStore>, policy: DuplicatePolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the stored row, or `None` when `category` is a sentinel.
    pub async fn save_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
    ) -> Result<Option<LabelEvent>> {
        if category.is_sentinel() {
            debug!("Ignoring menu action {category} on {picture_id}");
            return Ok(None);
        }

        let event = self
            .store
            .insert_label(user_id, picture_id, category, self.policy)
            .await
            .with_context(|| format!("failed to record {category} for picture {picture_id}"))?;

        Ok(Some(event))
    }
}
