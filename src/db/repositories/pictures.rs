use anyhow::{Context, Result};
use log::info;
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_optional_category, to_u64},
    models::{Category, Picture},
};

fn row_to_picture(row: &Row) -> Result<Picture> {
    let category: Option<String> = row.get("category")?;

    Ok(Picture {
        picture_id: row.get("picture_id")?,
        category: parse_optional_category(category)?,
    })
}

impl Database {
    /// Seed the picture table, but only when it is empty.
    ///
    /// Returns the number of rows inserted (zero when already seeded).
    pub async fn seed_pictures(&self, seed: Vec<Picture>) -> Result<usize> {
        self.execute(move |conn| {
            let existing: i64 =
                conn.query_row("SELECT COUNT(*) FROM pictures", [], |row| row.get(0))?;
            if existing > 0 {
                return Ok(0);
            }

            let tx = conn
                .transaction()
                .context("failed to open seeding transaction")?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO pictures (picture_id, category)
                     VALUES (?1, ?2)",
                )?;
                for picture in &seed {
                    stmt.execute(params![
                        picture.picture_id,
                        picture.category.map(|c| c.as_str()),
                    ])
                    .with_context(|| format!("failed to seed picture {}", picture.picture_id))?;
                }
            }
            tx.commit().context("failed to commit picture seed")?;

            info!("Seeded {} pictures", seed.len());
            Ok(seed.len())
        })
        .await
    }

    pub async fn picture_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM pictures", [], |row| row.get(0))?;
            to_u64(count, "picture count")
        })
        .await
    }

    /// Pictures with no label from `user_id`, optionally restricted to one
    /// seeded category, in seeding order.
    pub async fn get_unlabeled_pictures(
        &self,
        user_id: &str,
        category: Option<Category>,
    ) -> Result<Vec<Picture>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.picture_id, p.category
                 FROM pictures p
                 LEFT JOIN labels_local l
                        ON l.picture_id = p.picture_id
                       AND l.user_id = ?1
                 WHERE l.picture_id IS NULL
                   AND (?2 IS NULL OR p.category = ?2)
                 ORDER BY p.rowid ASC",
            )?;

            let mut rows = stmt.query(params![user_id, category.map(|c| c.as_str())])?;
            let mut pictures = Vec::new();
            while let Some(row) = rows.next()? {
                pictures.push(row_to_picture(row)?);
            }

            Ok(pictures)
        })
        .await
    }
}
