//! Bundled image catalog.
//!
//! The catalog is produced ahead of time (one entry per crop, with its raw
//! and zoomed-out asset paths) and is read-only at runtime. The labeling
//! core only needs the ids; the asset paths are handed back to whoever
//! renders the picture.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::db::{Category, Picture};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub zoomed: Option<String>,
    /// Pre-assigned category, only present in catalogs built for balanced selection.
    #[serde(default)]
    pub category: Option<Category>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw: None,
            zoomed: None,
            category: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.id.is_empty() {
                bail!("catalog entry {position} has an empty id");
            }
            if entry.category.is_some_and(|c| c.is_sentinel()) {
                bail!("catalog entry {} uses a menu sentinel as its category", entry.id);
            }
            if index.insert(entry.id.clone(), position).is_some() {
                bail!("duplicate catalog id {}", entry.id);
            }
        }
        Ok(Self { entries, index })
    }

    /// Load a JSON manifest: an array of `{ "id", "raw"?, "zoomed"?, "category"? }`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {}", path.display()))?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        Self::from_entries(entries)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Picture rows to seed the local store with, in catalog order.
    pub fn seed_pictures(&self) -> Vec<Picture> {
        self.entries
            .iter()
            .map(|entry| Picture {
                picture_id: entry.id.clone(),
                category: entry.category,
            })
            .collect()
    }
}
