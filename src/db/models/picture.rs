use serde::{Deserialize, Serialize};

use super::Category;

/// A labelable item seeded from the catalog.
///
/// `category` is only set for catalogs prepared for balanced selection and
/// never changes after seeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Picture {
    pub picture_id: String,
    pub category: Option<Category>,
}
