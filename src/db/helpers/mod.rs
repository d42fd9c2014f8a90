use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::Category;

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_category(value: &str) -> Result<Category> {
    value
        .parse::<Category>()
        .with_context(|| format!("stored category '{value}' is not recognized"))
}

pub fn parse_optional_category(value: Option<String>) -> Result<Option<Category>> {
    value.as_deref().map(parse_category).transpose()
}

/// `?, ?, ?` for an `IN (...)` clause with `count` parameters.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
