use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use roilabel_lib::{
    Catalog, CatalogEntry, Category, DuplicatePolicy, LabelError, LabelEvent, LabelStats,
    LabelStore, LabelingEvent, LabelingService, MemoryRemote, MemoryStore, MenuTier, NextPicture,
    Picture, PickOutcome, RemoteDelete, RemoteError, RemoteStore, ServiceOptions,
    remote::{NewRemoteLabel, RemoteLabelRecord},
};
use tokio::sync::broadcast;

fn catalog(ids: &[&str]) -> Catalog {
    Catalog::from_entries(ids.iter().map(|id| CatalogEntry::new(*id)).collect()).unwrap()
}

fn options() -> ServiceOptions {
    ServiceOptions {
        rng_seed: Some(7),
        ..ServiceOptions::default()
    }
}

async fn ready_service(
    ids: &[&str],
    remote: &Arc<MemoryRemote>,
    options: ServiceOptions,
) -> Arc<LabelingService> {
    let service = Arc::new(LabelingService::new(
        Arc::new(MemoryStore::new()),
        remote.clone(),
        catalog(ids),
        options,
    ));
    service.bootstrap().await.unwrap();
    service
}

fn drain(rx: &mut broadcast::Receiver<LabelingEvent>) -> Vec<LabelingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn shown(next: &NextPicture) -> String {
    match next {
        NextPicture::Ready { picture, .. } => picture.picture_id.clone(),
        NextPicture::AllDone => panic!("expected a picture, got AllDone"),
    }
}

/// Delegates to `MemoryStore` but fails the first `mark_synced` call, as if
/// the process died right after the remote commit.
struct CrashBeforeMark {
    inner: MemoryStore,
    armed: AtomicBool,
}

#[async_trait]
impl LabelStore for CrashBeforeMark {
    async fn bootstrap(&self, seed: Vec<Picture>) -> Result<usize> {
        self.inner.bootstrap(seed).await
    }

    async fn picture_count(&self) -> Result<u64> {
        self.inner.picture_count().await
    }

    async fn unlabeled_pictures(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Picture>> {
        self.inner.unlabeled_pictures(user_id, category).await
    }

    async fn category_counts(&self, user_id: &str) -> Result<HashMap<Category, u64>> {
        self.inner.category_counts(user_id).await
    }

    async fn insert_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
        policy: DuplicatePolicy,
    ) -> Result<LabelEvent> {
        self.inner
            .insert_label(user_id, picture_id, category, policy)
            .await
    }

    async fn fetch_unsynced(&self, user_id: &str) -> Result<Vec<LabelEvent>> {
        self.inner.fetch_unsynced(user_id).await
    }

    async fn mark_synced(&self, label_ids: &[i64]) -> Result<usize> {
        if self.armed.swap(false, Ordering::SeqCst) {
            bail!("simulated crash before marking rows synced");
        }
        self.inner.mark_synced(label_ids).await
    }

    async fn delete_label(&self, user_id: &str, picture_id: &str) -> Result<usize> {
        self.inner.delete_label(user_id, picture_id).await
    }

    async fn label_stats(&self, user_id: &str) -> Result<LabelStats> {
        self.inner.label_stats(user_id).await
    }
}

/// Commits to a `MemoryRemote`, then writes one more local label before the
/// synchronizer gets to mark the batch, as a user picking during a push would.
struct WriteDuringCommit {
    inner: Arc<MemoryRemote>,
    store: Arc<dyn LabelStore>,
    pending: Mutex<Option<(&'static str, Category, DuplicatePolicy)>>,
}

#[async_trait]
impl RemoteStore for WriteDuringCommit {
    async fn commit_batch(&self, labels: &[NewRemoteLabel]) -> Result<Vec<String>, RemoteError> {
        let ids = self.inner.commit_batch(labels).await?;
        let write = self.pending.lock().unwrap().take();
        if let Some((picture_id, category, policy)) = write {
            self.store
                .insert_label("alice", picture_id, category, policy)
                .await
                .unwrap();
        }
        Ok(ids)
    }

    async fn find_label(
        &self,
        user_id: &str,
        picture_id: &str,
    ) -> Result<Option<RemoteLabelRecord>, RemoteError> {
        self.inner.find_label(user_id, picture_id).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), RemoteError> {
        self.inner.delete_document(document_id).await
    }
}

async fn service_writing_during_commit(
    write: (&'static str, Category, DuplicatePolicy),
    options: ServiceOptions,
) -> (Arc<LabelingService>, Arc<MemoryRemote>) {
    let store: Arc<dyn LabelStore> = Arc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemote::new());
    let wrapper = Arc::new(WriteDuringCommit {
        inner: remote.clone(),
        store: store.clone(),
        pending: Mutex::new(Some(write)),
    });
    let service = Arc::new(LabelingService::new(
        store,
        wrapper,
        catalog(&["x", "y"]),
        options,
    ));
    service.bootstrap().await.unwrap();
    (service, remote)
}

#[tokio::test]
async fn operations_before_bootstrap_fail() {
    let remote = Arc::new(MemoryRemote::new());
    let service = LabelingService::new(
        Arc::new(MemoryStore::new()),
        remote,
        catalog(&["x"]),
        options(),
    );

    assert!(service.get_next_picture("alice").await.is_err());
    assert!(service.save_label("alice", "x", Category::Oli).await.is_err());
    assert!(service.sync_to_remote("alice").await.is_err());

    service.bootstrap().await.unwrap();
    assert!(service.get_next_picture("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn concurrent_bootstrap_seeds_once() {
    let remote = Arc::new(MemoryRemote::new());
    let store = Arc::new(MemoryStore::new());
    let service = LabelingService::new(store.clone(), remote, catalog(&["a", "b", "c"]), options());

    let (first, second) = tokio::join!(service.bootstrap(), service.bootstrap());
    assert_eq!(first.unwrap(), 3);
    assert_eq!(second.unwrap(), 3);
    assert_eq!(store.picture_count().await.unwrap(), 3);
}

#[tokio::test]
async fn sentinel_pick_records_nothing() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x"], &remote, options()).await;

    assert!(service
        .save_label("alice", "x", Category::More)
        .await
        .unwrap()
        .is_none());
    assert!(service
        .save_label("alice", "x", Category::Back)
        .await
        .unwrap()
        .is_none());
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn sync_pushes_every_pending_label_once() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x", "y", "z"], &remote, options()).await;

    for id in ["x", "y", "z"] {
        service.save_label("alice", id, Category::Astro).await.unwrap();
    }
    assert_eq!(service.fetch_unsynced("alice").await.unwrap().len(), 3);

    let outcome = service.sync_to_remote("alice").await.unwrap();
    assert_eq!(outcome.pushed, 3);
    assert_eq!(outcome.marked, 3);
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
    assert_eq!(remote.len(), 3);

    let again = service.sync_to_remote("alice").await.unwrap();
    assert_eq!(again.pushed, 0);
    assert_eq!(remote.len(), 3);
}

#[tokio::test]
async fn offline_sync_keeps_labels_pending_until_reconnect() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_online(false);
    let service = ready_service(&["x", "y"], &remote, options()).await;

    service.save_label("alice", "x", Category::Oli).await.unwrap();
    service.save_label("alice", "y", Category::Opc).await.unwrap();

    assert!(service.sync_to_remote("alice").await.is_err());
    assert_eq!(service.fetch_unsynced("alice").await.unwrap().len(), 2);
    assert!(remote.is_empty());

    remote.set_online(true);
    let outcome = service.sync_to_remote("alice").await.unwrap();
    assert_eq!(outcome.pushed, 2);
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn crash_between_commit_and_mark_duplicates_remotely() {
    let remote = Arc::new(MemoryRemote::new());
    let store = Arc::new(CrashBeforeMark {
        inner: MemoryStore::new(),
        armed: AtomicBool::new(true),
    });
    let service = LabelingService::new(store, remote.clone(), catalog(&["x"]), options());
    service.bootstrap().await.unwrap();

    service.save_label("alice", "x", Category::Oli).await.unwrap();

    assert!(service.sync_to_remote("alice").await.is_err());
    assert_eq!(remote.len(), 1);
    assert_eq!(service.fetch_unsynced("alice").await.unwrap().len(), 1);

    service.sync_to_remote("alice").await.unwrap();
    assert_eq!(remote.records_for("alice", "x").len(), 2);
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn label_written_during_a_push_stays_pending() {
    let (service, remote) =
        service_writing_during_commit(("y", Category::Opc, DuplicatePolicy::Reject), options())
            .await;

    service.save_label("alice", "x", Category::Oli).await.unwrap();
    let outcome = service.sync_to_remote("alice").await.unwrap();
    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.marked, 1);

    let pending = service.fetch_unsynced("alice").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].picture_id, "y");
    assert!(!pending[0].synced);
    assert_eq!(remote.len(), 1);

    assert_eq!(service.sync_to_remote("alice").await.unwrap().pushed, 1);
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
    assert_eq!(remote.records_for("alice", "y").len(), 1);
}

#[tokio::test]
async fn overwrite_during_a_push_is_not_marked_synced() {
    let (service, remote) = service_writing_during_commit(
        ("x", Category::Astro, DuplicatePolicy::Overwrite),
        ServiceOptions {
            duplicate_policy: DuplicatePolicy::Overwrite,
            ..options()
        },
    )
    .await;

    service.save_label("alice", "x", Category::Oli).await.unwrap();
    let outcome = service.sync_to_remote("alice").await.unwrap();
    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.marked, 0);

    let pending = service.fetch_unsynced("alice").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category, Category::Astro);

    service.sync_to_remote("alice").await.unwrap();
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
    let categories: Vec<Category> = remote
        .records_for("alice", "x")
        .iter()
        .map(|record| record.category)
        .collect();
    assert_eq!(categories, vec![Category::Oli, Category::Astro]);
}

#[tokio::test]
async fn background_sync_before_bootstrap_is_reported() {
    let remote = Arc::new(MemoryRemote::new());
    let service = LabelingService::new(
        Arc::new(MemoryStore::new()),
        remote.clone(),
        catalog(&["x"]),
        options(),
    );
    let mut events = service.events().subscribe();

    service.spawn_sync("alice").await.unwrap();

    assert!(remote.is_empty());
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        LabelingEvent::SyncFailed {
            retryable: false,
            ..
        }
    )));
}

#[tokio::test]
async fn duplicate_label_is_rejected_by_default() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x"], &remote, options()).await;

    service.save_label("alice", "x", Category::Oli).await.unwrap();
    let err = service
        .save_label("alice", "x", Category::Astro)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LabelError>(),
        Some(LabelError::AlreadyLabeled { .. })
    ));

    let pending = service.fetch_unsynced("alice").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category, Category::Oli);
}

#[tokio::test]
async fn overwrite_policy_replaces_the_category() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(
        &["x"],
        &remote,
        ServiceOptions {
            duplicate_policy: DuplicatePolicy::Overwrite,
            ..options()
        },
    )
    .await;

    service.save_label("alice", "x", Category::Oli).await.unwrap();
    service.sync_to_remote("alice").await.unwrap();
    service.save_label("alice", "x", Category::Astro).await.unwrap();

    let pending = service.fetch_unsynced("alice").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].category, Category::Astro);
    assert!(!pending[0].synced);
}

#[tokio::test]
async fn each_user_labels_every_picture_once() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["X", "Y", "Z"], &remote, options()).await;
    let mut session = service.session("alice");

    let mut next = session.load_next().await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(shown(&next));
        match session.handle_pick(Category::Oli).await.unwrap() {
            PickOutcome::Recorded { next: upcoming, .. } => next = upcoming,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    seen.sort();

    assert_eq!(seen, vec!["X", "Y", "Z"]);
    assert_eq!(next, NextPicture::AllDone);
    assert_eq!(session.session_count(), 3);
    assert!(service.get_next_picture("alice").await.unwrap().is_none());
    assert!(service.get_next_picture("bob").await.unwrap().is_some());

    session.flush_syncs().await;
    assert_eq!(remote.len(), 3);
}

#[tokio::test]
async fn menu_navigation_writes_no_labels() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x", "y"], &remote, options()).await;
    let mut session = service.session("alice");
    session.load_next().await.unwrap();

    assert_eq!(
        session.handle_pick(Category::More).await.unwrap(),
        PickOutcome::MenuChanged {
            menu: MenuTier::Secondary
        }
    );
    assert_eq!(
        session.handle_pick(Category::Back).await.unwrap(),
        PickOutcome::MenuChanged {
            menu: MenuTier::Primary
        }
    );
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());

    session.handle_pick(Category::More).await.unwrap();
    let outcome = session.handle_pick(Category::Nothing).await.unwrap();
    assert!(matches!(outcome, PickOutcome::Recorded { .. }));
    assert_eq!(session.menu(), MenuTier::Primary);
    assert_eq!(session.session_count(), 1);
}

#[tokio::test]
async fn undo_makes_the_picture_selectable_again() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x"], &remote, options()).await;
    let mut session = service.session("alice");

    let next = session.load_next().await.unwrap();
    assert_eq!(shown(&next), "x");
    session.handle_pick(Category::Opc).await.unwrap();
    session.flush_syncs().await;
    assert_eq!(remote.len(), 1);

    let outcome = session.handle_back().await.unwrap().unwrap();
    assert_eq!(outcome.local_deleted, 1);
    assert!(matches!(outcome.remote, RemoteDelete::Deleted { .. }));
    assert!(remote.is_empty());

    assert_eq!(session.session_count(), 0);
    assert!(!session.can_undo());
    assert_eq!(session.current().unwrap().picture_id, "x");
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
    assert_eq!(
        service.get_next_picture("alice").await.unwrap().unwrap().picture_id,
        "x"
    );

    assert!(session.handle_back().await.unwrap().is_none());
}

#[tokio::test]
async fn undo_while_offline_still_deletes_locally() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_online(false);
    let service = ready_service(&["x", "y"], &remote, options()).await;
    let mut events = service.events().subscribe();
    let mut session = service.session("alice");

    session.load_next().await.unwrap();
    let picked = session.current().unwrap().picture_id.clone();
    session.handle_pick(Category::Unknown).await.unwrap();
    session.flush_syncs().await;

    let outcome = session.handle_back().await.unwrap().unwrap();
    assert_eq!(outcome.local_deleted, 1);
    assert!(matches!(outcome.remote, RemoteDelete::Failed { .. }));
    assert!(service.fetch_unsynced("alice").await.unwrap().is_empty());
    assert_eq!(session.current().unwrap().picture_id, picked);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        LabelingEvent::SyncFailed {
            retryable: true,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        LabelingEvent::UndoRemoteFailed { picture_id, .. } if *picture_id == picked
    )));
}

#[tokio::test]
async fn undo_before_sync_reports_missing_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x"], &remote, options()).await;

    service.save_label("alice", "x", Category::Oli).await.unwrap();
    let outcome = service.delete_label_remote("alice", "x").await.unwrap();
    assert_eq!(outcome, RemoteDelete::Missing);
    assert_eq!(service.delete_label_local("alice", "x").await.unwrap(), 1);
    assert_eq!(service.delete_label_local("alice", "x").await.unwrap(), 0);
}

#[tokio::test]
async fn milestone_fires_on_tenth_label() {
    let ids: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&refs, &remote, options()).await;
    let mut events = service.events().subscribe();
    let mut session = service.session("");
    assert_eq!(session.user_id(), "user");

    session.load_next().await.unwrap();
    let mut milestones = Vec::new();
    for _ in 0..10 {
        if let PickOutcome::Recorded { milestone, .. } =
            session.handle_pick(Category::Astro).await.unwrap()
        {
            milestones.push(milestone);
        }
    }
    session.flush_syncs().await;

    assert_eq!(milestones.len(), 10);
    assert!(milestones[..9].iter().all(Option::is_none));
    assert_eq!(milestones[9], Some(10));
    assert!(drain(&mut events).contains(&LabelingEvent::Milestone {
        user_id: "user".into(),
        count: 10,
    }));
}

#[tokio::test]
async fn exhausted_selection_is_published() {
    let remote = Arc::new(MemoryRemote::new());
    let service = ready_service(&["x"], &remote, options()).await;
    let mut events = service.events().subscribe();
    let mut session = service.session("alice");

    session.load_next().await.unwrap();
    session.handle_pick(Category::Oli).await.unwrap();
    assert!(session.current().is_none());
    assert_eq!(
        session.handle_pick(Category::Oli).await.unwrap(),
        PickOutcome::NoPicture
    );

    assert!(drain(&mut events).contains(&LabelingEvent::SelectionExhausted {
        user_id: "alice".into()
    }));
}
