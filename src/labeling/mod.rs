pub mod history;
pub mod recorder;
pub mod service;
pub mod session;
pub mod sync;
pub mod undo;

pub use history::{HistoryEntry, HistoryStack};
pub use recorder::LabelRecorder;
pub use service::{LabelingService, ServiceOptions};
pub use session::{LabelingSession, MenuTier, NextPicture, PickOutcome};
pub use sync::{SyncOutcome, Synchronizer};
pub use undo::{RemoteDelete, UndoCoordinator, UndoOutcome};
