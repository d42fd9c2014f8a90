//! Shared, multi-writer label collection.
//!
//! One document per pushed label. There is no uniqueness guarantee on the
//! remote side: a retried push after a lost acknowledgement leaves a second
//! document for the same (user, picture), which readers must tolerate.

pub mod firestore;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{db::Category, error::RemoteError};

pub use firestore::{FirestoreConfig, FirestoreRemote};
pub use memory::MemoryRemote;

/// Payload for one document in a batch commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemoteLabel {
    pub user_id: String,
    pub picture_id: String,
    pub category: Category,
}

/// A label document as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLabelRecord {
    pub id: String,
    pub user_id: String,
    pub picture_id: String,
    pub category: Category,
    /// Server-assigned; absent if the server has not resolved it yet.
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Write every label as a new document, all or nothing. Returns the new
    /// document ids in input order.
    async fn commit_batch(&self, labels: &[NewRemoteLabel]) -> Result<Vec<String>, RemoteError>;

    /// First document for (user, picture), if any.
    async fn find_label(
        &self,
        user_id: &str,
        picture_id: &str,
    ) -> Result<Option<RemoteLabelRecord>, RemoteError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Memory,
    Firestore,
}

/// Build the configured remote. `offline` only affects the memory remote,
/// which then starts unreachable.
pub fn open_remote(
    kind: RemoteKind,
    firestore: &FirestoreConfig,
    offline: bool,
) -> anyhow::Result<Arc<dyn RemoteStore>> {
    match kind {
        RemoteKind::Memory => {
            let remote = MemoryRemote::new();
            remote.set_online(!offline);
            Ok(Arc::new(remote))
        }
        RemoteKind::Firestore => Ok(Arc::new(FirestoreRemote::new(firestore.clone())?)),
    }
}
