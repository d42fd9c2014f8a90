//! Reverses the most recent pick in both stores.
//!
//! The local delete is authoritative and its failure is reported. The
//! remote delete is best-effort: offline or missing documents are logged
//! and published, and never roll the local delete back.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    db::LabelStore,
    events::{EventSink, LabelingEvent},
    log_info, log_warn,
    remote::RemoteStore,
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RemoteDelete {
    #[serde(rename_all = "camelCase")]
    Deleted { document_id: String },
    /// Nothing matched, typically because the label was never pushed.
    Missing,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoOutcome {
    pub picture_id: String,
    pub local_deleted: usize,
    pub remote: RemoteDelete,
}

pub struct UndoCoordinator {
    store: Arc<dyn LabelStore>,
    remote: Arc<dyn RemoteStore>,
    events: EventSink,
}

impl UndoCoordinator {
    pub fn new(store: Arc<dyn LabelStore>, remote: Arc<dyn RemoteStore>, events: EventSink) -> Self {
        Self {
            store,
            remote,
            events,
        }
    }

    pub async fn delete_local(&self, user_id: &str, picture_id: &str) -> Result<usize> {
        self.store
            .delete_label(user_id, picture_id)
            .await
            .with_context(|| format!("failed to delete local label for {picture_id}"))
    }

    /// Look up the first remote document for (user, picture) and delete it.
    pub async fn delete_remote(&self, user_id: &str, picture_id: &str) -> Result<RemoteDelete> {
        let found = self
            .remote
            .find_label(user_id, picture_id)
            .await
            .with_context(|| format!("failed to look up remote label for {picture_id}"))?;

        let Some(record) = found else {
            return Ok(RemoteDelete::Missing);
        };

        self.remote
            .delete_document(&record.id)
            .await
            .with_context(|| format!("failed to delete remote document {}", record.id))?;

        Ok(RemoteDelete::Deleted {
            document_id: record.id,
        })
    }

    /// Delete locally (errors propagate), then remotely (errors are absorbed).
    pub async fn undo(&self, user_id: &str, picture_id: &str) -> Result<UndoOutcome> {
        let local_deleted = self.delete_local(user_id, picture_id).await?;

        let remote = match self.delete_remote(user_id, picture_id).await {
            Ok(RemoteDelete::Missing) => {
                log_info!("No remote label for {picture_id}; it was probably never synced");
                self.events.emit(LabelingEvent::UndoRemoteMissing {
                    user_id: user_id.to_string(),
                    picture_id: picture_id.to_string(),
                });
                RemoteDelete::Missing
            }
            Ok(deleted) => deleted,
            Err(err) => {
                log_warn!("Could not delete {picture_id} remotely, continuing anyway: {err:#}");
                let error = format!("{err:#}");
                self.events.emit(LabelingEvent::UndoRemoteFailed {
                    user_id: user_id.to_string(),
                    picture_id: picture_id.to_string(),
                    error: error.clone(),
                });
                RemoteDelete::Failed { error }
            }
        };

        Ok(UndoOutcome {
            picture_id: picture_id.to_string(),
            local_deleted,
            remote,
        })
    }
}
