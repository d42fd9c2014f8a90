use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::{sync::OnceCell, task::JoinHandle};

use crate::{
    catalog::Catalog,
    config::AppConfig,
    db::{open_store, Category, DuplicatePolicy, LabelEvent, LabelStats, LabelStore, Picture},
    events::{EventSink, LabelingEvent},
    remote::{open_remote, RemoteStore},
    selector::{SelectionPolicy, Selector},
};

use super::{
    recorder::LabelRecorder,
    session::LabelingSession,
    sync::{SyncOutcome, Synchronizer},
    undo::{RemoteDelete, UndoCoordinator, UndoOutcome},
};

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub selection: SelectionPolicy,
    pub duplicate_policy: DuplicatePolicy,
    pub event_capacity: usize,
    /// Fixed selector seed; `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::Uniform,
            duplicate_policy: DuplicatePolicy::Reject,
            event_capacity: 64,
            rng_seed: None,
        }
    }
}

/// Entry point for the labeling front end.
///
/// Owns the store and remote handles it was given and wires them into the
/// selector, recorder, synchronizer and undo coordinator. `bootstrap` must
/// complete before any other call.
pub struct LabelingService {
    store: Arc<dyn LabelStore>,
    catalog: Arc<Catalog>,
    selector: Selector,
    recorder: LabelRecorder,
    synchronizer: Synchronizer,
    undo: UndoCoordinator,
    events: EventSink,
    seeded: OnceCell<usize>,
}

impl LabelingService {
    pub fn new(
        store: Arc<dyn LabelStore>,
        remote: Arc<dyn RemoteStore>,
        catalog: Catalog,
        options: ServiceOptions,
    ) -> Self {
        let events = EventSink::new(options.event_capacity);
        let selector = match options.rng_seed {
            Some(seed) => Selector::with_seed(store.clone(), options.selection, seed),
            None => Selector::new(store.clone(), options.selection),
        };

        Self {
            selector,
            recorder: LabelRecorder::new(store.clone(), options.duplicate_policy),
            synchronizer: Synchronizer::new(store.clone(), remote.clone(), events.clone()),
            undo: UndoCoordinator::new(store.clone(), remote, events.clone()),
            store,
            catalog: Arc::new(catalog),
            events,
            seeded: OnceCell::new(),
        }
    }

    /// Open the configured catalog, store and remote.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let catalog = Catalog::load(&config.catalog_path)?;
        let store = open_store(config.storage.backend, &config.storage.path)
            .context("failed to open label store")?;
        let remote = open_remote(
            config.remote.backend,
            &config.remote.firestore,
            config.remote.offline,
        )?;

        Ok(Self::new(
            store,
            remote,
            catalog,
            ServiceOptions {
                selection: config.selection.policy,
                duplicate_policy: config.storage.duplicate_policy,
                event_capacity: config.event_capacity,
                rng_seed: None,
            },
        ))
    }

    /// Seed the picture table from the catalog if it is empty. Safe to call
    /// repeatedly and concurrently; the seed runs at most once per process.
    /// Returns how many pictures were seeded by the run that did the work.
    pub async fn bootstrap(&self) -> Result<usize> {
        let seeded = self
            .seeded
            .get_or_try_init(|| async {
                let seeded = self
                    .store
                    .bootstrap(self.catalog.seed_pictures())
                    .await
                    .context("failed to seed pictures")?;

                let stored = self.store.picture_count().await?;
                if seeded == 0 && stored != self.catalog.len() as u64 {
                    warn!(
                        "Picture table holds {stored} rows but the catalog has {}; keeping the existing seed",
                        self.catalog.len()
                    );
                }
                info!("Label store ready with {stored} pictures");
                Ok::<usize, anyhow::Error>(seeded)
            })
            .await?;
        Ok(*seeded)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.seeded.initialized() {
            Ok(())
        } else {
            bail!("labeling service used before bootstrap completed")
        }
    }

    pub async fn get_next_picture(&self, user_id: &str) -> Result<Option<Picture>> {
        self.ensure_ready()?;
        self.selector.next_picture(user_id).await
    }

    pub async fn save_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
    ) -> Result<Option<LabelEvent>> {
        self.ensure_ready()?;
        self.recorder.save_label(user_id, picture_id, category).await
    }

    pub async fn fetch_unsynced(&self, user_id: &str) -> Result<Vec<LabelEvent>> {
        self.ensure_ready()?;
        self.synchronizer.fetch_unsynced(user_id).await
    }

    /// Awaitable push; errors are returned to the caller.
    pub async fn sync_to_remote(&self, user_id: &str) -> Result<SyncOutcome> {
        self.ensure_ready()?;
        self.synchronizer.sync_user(user_id).await
    }

    /// Background push; errors go to the log and the event sink.
    pub fn spawn_sync(&self, user_id: &str) -> JoinHandle<()> {
        if let Err(err) = self.ensure_ready() {
            warn!("Skipping background sync for {user_id}: {err}");
            self.events.emit(LabelingEvent::SyncFailed {
                user_id: user_id.to_string(),
                error: err.to_string(),
                retryable: false,
            });
            return tokio::spawn(async {});
        }
        self.synchronizer.spawn_sync(user_id)
    }

    pub async fn delete_label_local(&self, user_id: &str, picture_id: &str) -> Result<usize> {
        self.ensure_ready()?;
        self.undo.delete_local(user_id, picture_id).await
    }

    pub async fn delete_label_remote(&self, user_id: &str, picture_id: &str) -> Result<RemoteDelete> {
        self.ensure_ready()?;
        self.undo.delete_remote(user_id, picture_id).await
    }

    pub(crate) async fn undo_label(&self, user_id: &str, picture_id: &str) -> Result<UndoOutcome> {
        self.ensure_ready()?;
        self.undo.undo(user_id, picture_id).await
    }

    pub async fn stats(&self, user_id: &str) -> Result<LabelStats> {
        self.ensure_ready()?;
        self.store.label_stats(user_id).await
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub(crate) fn emit(&self, event: LabelingEvent) {
        self.events.emit(event);
    }

    /// Start an interactive session for `user_id`.
    pub fn session(self: &Arc<Self>, user_id: &str) -> LabelingSession {
        LabelingSession::new(Arc::clone(self), user_id)
    }
}
