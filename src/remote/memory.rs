use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{NewRemoteLabel, RemoteLabelRecord, RemoteStore};
use crate::error::RemoteError;

/// In-process stand-in for the shared collection.
///
/// Every call fails with `RemoteError::Offline` while the remote is switched
/// off, which is how partial connectivity is exercised without a network.
pub struct MemoryRemote {
    online: AtomicBool,
    documents: Mutex<Vec<RemoteLabelRecord>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored document, in write order.
    pub fn records(&self) -> Vec<RemoteLabelRecord> {
        self.lock().clone()
    }

    pub fn records_for(&self, user_id: &str, picture_id: &str) -> Vec<RemoteLabelRecord> {
        self.lock()
            .iter()
            .filter(|r| r.user_id == user_id && r.picture_id == picture_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RemoteLabelRecord>> {
        match self.documents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(RemoteError::Offline)
        }
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn commit_batch(&self, labels: &[NewRemoteLabel]) -> Result<Vec<String>, RemoteError> {
        self.ensure_online()?;

        let now = Utc::now();
        let batch: Vec<RemoteLabelRecord> = labels
            .iter()
            .map(|label| RemoteLabelRecord {
                id: Uuid::new_v4().simple().to_string(),
                user_id: label.user_id.clone(),
                picture_id: label.picture_id.clone(),
                category: label.category,
                created_at: Some(now),
            })
            .collect();
        let ids = batch.iter().map(|r| r.id.clone()).collect();

        self.lock().extend(batch);
        Ok(ids)
    }

    async fn find_label(
        &self,
        user_id: &str,
        picture_id: &str,
    ) -> Result<Option<RemoteLabelRecord>, RemoteError> {
        self.ensure_online()?;
        Ok(self
            .lock()
            .iter()
            .find(|r| r.user_id == user_id && r.picture_id == picture_id)
            .cloned())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), RemoteError> {
        self.ensure_online()?;
        self.lock().retain(|r| r.id != document_id);
        Ok(())
    }
}
