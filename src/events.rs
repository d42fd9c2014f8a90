//! Observable channel for best-effort outcomes.
//!
//! Background sync and remote undo never report failures to the interactive
//! path. They log and publish here instead, so a front end can show a
//! "working offline" badge or a milestone animation if it wants to.

use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LabelingEvent {
    #[serde(rename_all = "camelCase")]
    SyncCompleted { user_id: String, pushed: usize },
    #[serde(rename_all = "camelCase")]
    SyncFailed {
        user_id: String,
        error: String,
        /// The remote was unreachable or overloaded; the rows stay pending.
        retryable: bool,
    },
    #[serde(rename_all = "camelCase")]
    UndoRemoteFailed {
        user_id: String,
        picture_id: String,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    UndoRemoteMissing { user_id: String, picture_id: String },
    #[serde(rename_all = "camelCase")]
    SelectionExhausted { user_id: String },
    #[serde(rename_all = "camelCase")]
    Milestone { user_id: String, count: u32 },
}

#[derive(Clone)]
pub struct EventSink {
    tx: broadcast::Sender<LabelingEvent>,
}

impl EventSink {
    /// `capacity` events are buffered per subscriber before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish, ignoring the case where nobody is listening.
    pub fn emit(&self, event: LabelingEvent) {
        match self.tx.send(event) {
            Ok(count) => debug!("Delivered labeling event to {count} subscribers"),
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for labeling event {event:?}")
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LabelingEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(64)
    }
}
