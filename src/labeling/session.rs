//! Per-user interactive labeling state.
//!
//! A session shows one picture at a time behind a two-tier category menu.
//! Each terminal pick is written locally, pushed in the background and
//! remembered for undo; the next picture is selected straight away without
//! waiting for the push.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::{
    catalog::CatalogEntry,
    db::{Category, LabelEvent, Picture},
    events::LabelingEvent,
    log_info, log_warn,
};

use super::{
    history::{HistoryEntry, HistoryStack},
    service::LabelingService,
    undo::UndoOutcome,
};

const ENABLE_LOGS: bool = true;

/// Session counts that trigger a celebration.
const MILESTONES: [u32; 3] = [10, 30, 50];

const DEFAULT_USER: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MenuTier {
    #[default]
    Primary,
    Secondary,
}

impl MenuTier {
    pub fn categories(&self) -> [Category; 4] {
        match self {
            MenuTier::Primary => Category::PRIMARY_MENU,
            MenuTier::Secondary => Category::SECONDARY_MENU,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum NextPicture {
    Ready {
        picture: Picture,
        /// Asset paths for display; absent if the catalog lost the entry.
        entry: Option<CatalogEntry>,
    },
    AllDone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PickOutcome {
    /// Nothing is on screen, so there was nothing to label.
    NoPicture,
    MenuChanged { menu: MenuTier },
    Recorded {
        event: LabelEvent,
        milestone: Option<u32>,
        next: NextPicture,
    },
}

pub struct LabelingSession {
    service: Arc<LabelingService>,
    user_id: String,
    current: Option<Picture>,
    history: HistoryStack,
    session_count: u32,
    menu: MenuTier,
    in_flight: Vec<JoinHandle<()>>,
}

impl LabelingSession {
    pub fn new(service: Arc<LabelingService>, user_id: &str) -> Self {
        let user_id = user_id.trim();
        Self {
            service,
            user_id: if user_id.is_empty() {
                DEFAULT_USER.to_string()
            } else {
                user_id.to_string()
            },
            current: None,
            history: HistoryStack::new(),
            session_count: 0,
            menu: MenuTier::Primary,
            in_flight: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn current(&self) -> Option<&Picture> {
        self.current.as_ref()
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn menu(&self) -> MenuTier {
        self.menu
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Ask the selector for the next picture and put it on screen.
    pub async fn load_next(&mut self) -> Result<NextPicture> {
        match self.service.get_next_picture(&self.user_id).await? {
            Some(picture) => Ok(self.show(picture)),
            None => {
                log_info!("All pictures labeled for {}", self.user_id);
                self.current = None;
                self.service.emit(LabelingEvent::SelectionExhausted {
                    user_id: self.user_id.clone(),
                });
                Ok(NextPicture::AllDone)
            }
        }
    }

    fn show(&mut self, picture: Picture) -> NextPicture {
        let entry = self.service.catalog().get(&picture.picture_id).cloned();
        if entry.is_none() {
            log_warn!(
                "Picture {} is seeded but missing from the catalog",
                picture.picture_id
            );
        }
        self.current = Some(picture.clone());
        NextPicture::Ready { picture, entry }
    }

    pub async fn handle_pick(&mut self, category: Category) -> Result<PickOutcome> {
        let Some(picture) = self.current.clone() else {
            return Ok(PickOutcome::NoPicture);
        };

        match category {
            Category::More => {
                self.menu = MenuTier::Secondary;
                return Ok(PickOutcome::MenuChanged { menu: self.menu });
            }
            Category::Back => {
                self.menu = MenuTier::Primary;
                return Ok(PickOutcome::MenuChanged { menu: self.menu });
            }
            _ => {}
        }

        let Some(event) = self
            .service
            .save_label(&self.user_id, &picture.picture_id, category)
            .await?
        else {
            return Ok(PickOutcome::MenuChanged { menu: self.menu });
        };

        log_info!("Image {} was classified as {category}", picture.picture_id);

        self.menu = MenuTier::Primary;
        self.history.push(HistoryEntry {
            picture,
            label: category,
        });
        self.session_count += 1;

        self.in_flight.retain(|handle| !handle.is_finished());
        self.in_flight.push(self.service.spawn_sync(&self.user_id));

        let milestone = MILESTONES
            .contains(&self.session_count)
            .then_some(self.session_count);
        if let Some(count) = milestone {
            self.service.emit(LabelingEvent::Milestone {
                user_id: self.user_id.clone(),
                count,
            });
        }

        let next = self.load_next().await?;
        Ok(PickOutcome::Recorded {
            event,
            milestone,
            next,
        })
    }

    /// Undo the most recent pick and show that picture again.
    ///
    /// Returns `None` when there is nothing to undo. If the local delete
    /// fails the history is left as it was.
    pub async fn handle_back(&mut self) -> Result<Option<UndoOutcome>> {
        let Some(last) = self.history.last().cloned() else {
            return Ok(None);
        };

        let outcome = self
            .service
            .undo_label(&self.user_id, &last.picture.picture_id)
            .await?;

        self.history.pop();
        self.session_count = self.session_count.saturating_sub(1);
        self.menu = MenuTier::Primary;
        self.current = Some(last.picture);

        Ok(Some(outcome))
    }

    /// Wait for every background push this session started.
    pub async fn flush_syncs(&mut self) {
        for handle in self.in_flight.drain(..) {
            if let Err(err) = handle.await {
                log_warn!("Background sync task ended abnormally: {err}");
            }
        }
    }
}
