//! Label event data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// One recorded label, as stored in `labels_local`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelEvent {
    pub label_id: i64,
    pub user_id: String,
    pub picture_id: String,
    pub category: Category,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
}

/// What to do when a user labels a picture they already labeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the existing row and fail with `LabelError::AlreadyLabeled`.
    #[default]
    Reject,
    /// Replace the category, mark the row unsynced and refresh `created_at`.
    Overwrite,
}

/// Per-user totals used by the status view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStats {
    pub pictures: u64,
    pub labeled: u64,
    pub unsynced: u64,
}
