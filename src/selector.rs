//! Picks the next picture a user should label.
//!
//! The selection pool is recomputed from the store on every call, so the
//! selector must be asked again after each recorded label and after each
//! undo.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::db::{Category, LabelStore, Picture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Any unlabeled picture, uniformly at random.
    #[default]
    Uniform,
    /// A picture from the category the user has labeled least so far.
    Balanced,
}

pub struct Selector {
    store: Arc<dyn LabelStore>,
    policy: SelectionPolicy,
    rng: Mutex<StdRng>,
}

impl Selector {
    pub fn new(store: Arc<dyn LabelStore>, policy: SelectionPolicy) -> Self {
        Self::with_rng(store, policy, StdRng::from_entropy())
    }

    /// Deterministic selector, for reproducible runs.
    pub fn with_seed(store: Arc<dyn LabelStore>, policy: SelectionPolicy, seed: u64) -> Self {
        Self::with_rng(store, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<dyn LabelStore>, policy: SelectionPolicy, rng: StdRng) -> Self {
        Self {
            store,
            policy,
            rng: Mutex::new(rng),
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// `None` means nothing is left for this user.
    pub async fn next_picture(&self, user_id: &str) -> Result<Option<Picture>> {
        match self.policy {
            SelectionPolicy::Uniform => self.next_uniform(user_id).await,
            SelectionPolicy::Balanced => self.next_balanced(user_id).await,
        }
    }

    async fn next_uniform(&self, user_id: &str) -> Result<Option<Picture>> {
        let candidates = self.store.unlabeled_pictures(user_id, None).await?;
        Ok(self.pick(&candidates))
    }

    async fn next_balanced(&self, user_id: &str) -> Result<Option<Picture>> {
        let counts = self.store.category_counts(user_id).await?;

        // Least-labeled category first; an exhausted category falls through
        // to the next one so `None` is only returned when every pool is empty.
        for category in self.category_order(&counts) {
            let candidates = self
                .store
                .unlabeled_pictures(user_id, Some(category))
                .await?;
            if let Some(picture) = self.pick(&candidates) {
                return Ok(Some(picture));
            }
            debug!("No unlabeled {category} pictures left for {user_id}");
        }

        Ok(None)
    }

    /// Terminal categories by ascending count, ties in random order.
    fn category_order(&self, counts: &HashMap<Category, u64>) -> Vec<Category> {
        let mut order = Category::TERMINAL.to_vec();
        order.shuffle(&mut *self.rng());
        order.sort_by_key(|category| counts.get(category).copied().unwrap_or(0));
        order
    }

    fn pick(&self, candidates: &[Picture]) -> Option<Picture> {
        candidates.choose(&mut *self.rng()).cloned()
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
