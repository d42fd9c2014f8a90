//! Pushes unsynced labels to the remote collection.
//!
//! Delivery is at-least-once. The local `synced` flag only flips after the
//! remote batch commits, so a failure between the two steps leaves the rows
//! pending and the next call pushes them again, producing a duplicate remote
//! document rather than losing a label. Overlapping calls for one user are
//! not serialized and may push the same rows twice for the same reason.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    db::{LabelEvent, LabelStore},
    error::RemoteError,
    events::{EventSink, LabelingEvent},
    log_error, log_info, log_warn,
    remote::{NewRemoteLabel, RemoteStore},
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// Documents written remotely.
    pub pushed: usize,
    /// Local rows flagged as synced afterwards.
    pub marked: usize,
}

#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn LabelStore>,
    remote: Arc<dyn RemoteStore>,
    events: EventSink,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn LabelStore>, remote: Arc<dyn RemoteStore>, events: EventSink) -> Self {
        Self {
            store,
            remote,
            events,
        }
    }

    pub async fn fetch_unsynced(&self, user_id: &str) -> Result<Vec<LabelEvent>> {
        self.store
            .fetch_unsynced(user_id)
            .await
            .with_context(|| format!("failed to read unsynced labels for {user_id}"))
    }

    /// One push attempt: read pending rows, commit them as one batch, then
    /// mark exactly those rows synced.
    pub async fn sync_user(&self, user_id: &str) -> Result<SyncOutcome> {
        let unsynced = self.fetch_unsynced(user_id).await?;
        if unsynced.is_empty() {
            return Ok(SyncOutcome::default());
        }

        let batch: Vec<NewRemoteLabel> = unsynced
            .iter()
            .map(|label| NewRemoteLabel {
                user_id: label.user_id.clone(),
                picture_id: label.picture_id.clone(),
                category: label.category,
            })
            .collect();

        let written = self
            .remote
            .commit_batch(&batch)
            .await
            .with_context(|| format!("remote batch of {} labels failed", batch.len()))?;

        let label_ids: Vec<i64> = unsynced.iter().map(|label| label.label_id).collect();
        let marked = self
            .store
            .mark_synced(&label_ids)
            .await
            .context("remote batch committed but local rows were not marked synced")?;

        log_info!(
            "Synced {} labels for {user_id} ({} marked locally)",
            written.len(),
            marked
        );

        Ok(SyncOutcome {
            pushed: written.len(),
            marked,
        })
    }

    /// Fire-and-forget push. Failures are logged and published on the
    /// event sink; they never reach the caller.
    pub fn spawn_sync(&self, user_id: &str) -> JoinHandle<()> {
        let this = self.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            match this.sync_user(&user_id).await {
                Ok(outcome) if outcome.pushed > 0 => {
                    this.events.emit(LabelingEvent::SyncCompleted {
                        user_id,
                        pushed: outcome.pushed,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    let retryable = is_retryable(&err);
                    if retryable {
                        log_warn!("Background sync for {user_id} deferred: {err:#}");
                    } else {
                        log_error!("Background sync for {user_id} failed: {err:#}");
                    }
                    this.events.emit(LabelingEvent::SyncFailed {
                        user_id,
                        error: format!("{err:#}"),
                        retryable,
                    });
                }
            }
        })
    }
}

/// Whether a failed push came from a remote error worth retrying later.
fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RemoteError>()
        .is_some_and(RemoteError::is_transient)
}
