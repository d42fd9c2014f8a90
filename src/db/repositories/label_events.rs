use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use crate::{
    db::{
        connection::Database,
        helpers::{parse_category, parse_datetime, placeholders, to_u64},
        models::{Category, DuplicatePolicy, LabelEvent, LabelStats},
    },
    error::LabelError,
};

const LABEL_COLUMNS: &str = "label_id, user_id, picture_id, category, synced, created_at";

fn row_to_label_event(row: &Row) -> Result<LabelEvent> {
    let category: String = row.get("category")?;
    let synced: i64 = row.get("synced")?;
    let created_at: String = row.get("created_at")?;

    Ok(LabelEvent {
        label_id: row.get("label_id")?,
        user_id: row.get("user_id")?,
        picture_id: row.get("picture_id")?,
        category: parse_category(&category)?,
        synced: synced != 0,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Append one label row. Sentinel categories are refused outright.
    pub async fn insert_label(
        &self,
        user_id: &str,
        picture_id: &str,
        category: Category,
        policy: DuplicatePolicy,
    ) -> Result<LabelEvent> {
        if category.is_sentinel() {
            bail!("refusing to store menu sentinel {category} as a label");
        }

        let user_id = user_id.to_string();
        let picture_id = picture_id.to_string();
        self.execute(move |conn| {
            let known: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM pictures WHERE picture_id = ?1",
                    params![picture_id],
                    |row| row.get(0),
                )
                .optional()?;
            if known.is_none() {
                return Err(LabelError::UnknownPicture(picture_id).into());
            }

            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;

            // Overwrite replaces the row rather than updating it, so the
            // replacement always carries a label_id no earlier fetch has seen.
            if policy == DuplicatePolicy::Overwrite {
                tx.execute(
                    "DELETE FROM labels_local
                     WHERE user_id = ?1 AND picture_id = ?2",
                    params![user_id, picture_id],
                )
                .with_context(|| "failed to replace label")?;
            }

            let changed = tx
                .execute(
                    "INSERT INTO labels_local (user_id, picture_id, category, synced, created_at)
                     VALUES (?1, ?2, ?3, 0, ?4)
                     ON CONFLICT(user_id, picture_id) DO NOTHING",
                    params![user_id, picture_id, category.as_str(), now],
                )
                .with_context(|| "failed to insert label")?;
            if changed == 0 {
                return Err(LabelError::AlreadyLabeled {
                    user_id,
                    picture_id,
                }
                .into());
            }

            let label_id = tx.last_insert_rowid();
            let event = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {LABEL_COLUMNS}
                     FROM labels_local
                     WHERE label_id = ?1"
                ))?;
                let mut rows = stmt.query(params![label_id])?;
                match rows.next()? {
                    Some(row) => row_to_label_event(row)?,
                    None => bail!("label not found after insert"),
                }
            };

            tx.commit()?;
            Ok(event)
        })
        .await
    }

    pub async fn get_unsynced_labels(&self, user_id: &str) -> Result<Vec<LabelEvent>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LABEL_COLUMNS}
                 FROM labels_local
                 WHERE user_id = ?1 AND synced = 0
                 ORDER BY label_id ASC"
            ))?;

            let mut rows = stmt.query(params![user_id])?;
            let mut labels = Vec::new();
            while let Some(row) = rows.next()? {
                labels.push(row_to_label_event(row)?);
            }

            Ok(labels)
        })
        .await
    }

    /// Flag the given rows as pushed, in one statement.
    pub async fn mark_labels_synced(&self, label_ids: Vec<i64>) -> Result<usize> {
        if label_ids.is_empty() {
            return Ok(0);
        }

        self.execute(move |conn| {
            let sql = format!(
                "UPDATE labels_local
                 SET synced = 1
                 WHERE label_id IN ({})",
                placeholders(label_ids.len())
            );
            let updated = conn
                .execute(&sql, params_from_iter(label_ids.iter()))
                .with_context(|| "failed to mark labels synced")?;
            Ok(updated)
        })
        .await
    }

    pub async fn delete_label(&self, user_id: &str, picture_id: &str) -> Result<usize> {
        let user_id = user_id.to_string();
        let picture_id = picture_id.to_string();
        self.execute(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM labels_local
                     WHERE user_id = ?1 AND picture_id = ?2",
                    params![user_id, picture_id],
                )
                .with_context(|| "failed to delete label")?;
            Ok(deleted)
        })
        .await
    }

    /// Labels recorded by `user_id`, per category. Categories without labels
    /// are absent from the map.
    pub async fn get_category_counts(&self, user_id: &str) -> Result<HashMap<Category, u64>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT category, COUNT(*) AS n
                 FROM labels_local
                 WHERE user_id = ?1
                 GROUP BY category",
            )?;

            let mut rows = stmt.query(params![user_id])?;
            let mut counts = HashMap::new();
            while let Some(row) = rows.next()? {
                let category: String = row.get(0)?;
                let n: i64 = row.get(1)?;
                counts.insert(parse_category(&category)?, to_u64(n, "category count")?);
            }

            Ok(counts)
        })
        .await
    }

    pub async fn get_label_stats(&self, user_id: &str) -> Result<LabelStats> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let pictures: i64 =
                conn.query_row("SELECT COUNT(*) FROM pictures", [], |row| row.get(0))?;
            let (labeled, unsynced): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN synced = 0 THEN 1 ELSE 0 END), 0)
                 FROM labels_local
                 WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(LabelStats {
                pictures: to_u64(pictures, "pictures")?,
                labeled: to_u64(labeled, "labeled")?,
                unsynced: to_u64(unsynced, "unsynced")?,
            })
        })
        .await
    }
}
