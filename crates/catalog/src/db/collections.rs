use crate::db::{query_all, query_optional, DbHandle, DbResult};
use anyhow::{bail, Context};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// A named grouping of albums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
    /// Legacy password digest; stored but never consulted for reads.
    #[serde(skip)]
    pub password: Option<String>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            password: None,
        }
    }

    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO collections (name, password) VALUES (?1, ?2)",
            params![self.name, self.password],
        )
        .with_context(|| format!("failed to insert collection {}", self.name))?;
        Ok(db.last_insert_rowid())
    }

    pub fn load<H: DbHandle>(db: &H, id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT id, name, password FROM collections WHERE id = ?1",
            params![id],
            Collection::from_row,
        )
        .with_context(|| format!("failed to load collection id={id}"))
    }

    pub fn load_all<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            "SELECT id, name, password FROM collections ORDER BY id",
            [],
            Collection::from_row,
        )
        .context("failed to list collections")
    }

    pub fn rename<H: DbHandle>(db: &H, id: i64, name: &str) -> DbResult<()> {
        let changed = db
            .execute(
                "UPDATE collections SET name = ?1 WHERE id = ?2",
                params![name, id],
            )
            .with_context(|| format!("failed to rename collection id={id}"))?;
        if changed == 0 {
            bail!("collection id={id} does not exist");
        }
        Ok(())
    }

    pub fn set_password<H: DbHandle>(db: &H, id: i64, digest: Option<&str>) -> DbResult<()> {
        db.execute(
            "UPDATE collections SET password = ?1 WHERE id = ?2",
            params![digest, id],
        )
        .with_context(|| format!("failed to update password of collection id={id}"))?;
        Ok(())
    }

    pub fn delete<H: DbHandle>(db: &H, id: i64) -> DbResult<()> {
        db.execute("DELETE FROM collections WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete collection id={id}"))?;
        Ok(())
    }

    fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            password: row.get(2)?,
        })
    }
}
