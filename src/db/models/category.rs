//! The fixed label taxonomy.
//!
//! Two tiers are shown to the labeler: the primary menu and a secondary menu
//! reached through `More`. `More` and `Back` only switch tiers and are never
//! stored as labels.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::LabelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Oli,
    #[serde(rename = "OPC")]
    Opc,
    Astro,
    More,
    Multiple,
    Unknown,
    Nothing,
    Back,
}

impl Category {
    /// Categories that become real labels, in balancing order.
    pub const TERMINAL: [Category; 6] = [
        Category::Oli,
        Category::Opc,
        Category::Astro,
        Category::Multiple,
        Category::Unknown,
        Category::Nothing,
    ];

    pub const PRIMARY_MENU: [Category; 4] =
        [Category::Oli, Category::Opc, Category::Astro, Category::More];

    pub const SECONDARY_MENU: [Category; 4] = [
        Category::Multiple,
        Category::Unknown,
        Category::Nothing,
        Category::Back,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Oli => "Oli",
            Category::Opc => "OPC",
            Category::Astro => "Astro",
            Category::More => "More",
            Category::Multiple => "Multiple",
            Category::Unknown => "Unknown",
            Category::Nothing => "Nothing",
            Category::Back => "Back",
        }
    }

    /// Menu navigation values that must never reach the label table.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Category::More | Category::Back)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LabelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Oli" => Ok(Category::Oli),
            "OPC" => Ok(Category::Opc),
            "Astro" => Ok(Category::Astro),
            "More" => Ok(Category::More),
            "Multiple" => Ok(Category::Multiple),
            "Unknown" => Ok(Category::Unknown),
            "Nothing" => Ok(Category::Nothing),
            "Back" => Ok(Category::Back),
            other => Err(LabelError::UnknownCategory(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_excluded_from_terminal_set() {
        for category in Category::TERMINAL {
            assert!(!category.is_sentinel());
        }
        assert!(Category::More.is_sentinel());
        assert!(Category::Back.is_sentinel());
    }

    #[test]
    fn string_form_matches_menu_spelling() {
        assert_eq!("OPC".parse::<Category>().unwrap(), Category::Opc);
        assert_eq!(Category::Opc.to_string(), "OPC");
        assert_eq!(
            serde_json::to_string(&Category::Opc).unwrap(),
            "\"OPC\""
        );
        assert!(matches!(
            "opc".parse::<Category>(),
            Err(LabelError::UnknownCategory(_))
        ));
    }
}
