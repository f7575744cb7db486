use crate::db::{query_all, query_optional, DbHandle, DbResult};
use anyhow::{bail, Context};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub name: String,
    /// Hex digest of the album password; `None` means unlocked.
    #[serde(skip)]
    pub password: Option<String>,
}

impl Album {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            password: None,
        }
    }

    pub fn locked(&self) -> bool {
        self.password.is_some()
    }

    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO albums (name, password) VALUES (?1, ?2)",
            params![self.name, self.password],
        )
        .with_context(|| format!("failed to insert album {}", self.name))?;
        Ok(db.last_insert_rowid())
    }

    pub fn load<H: DbHandle>(db: &H, id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT id, name, password FROM albums WHERE id = ?1",
            params![id],
            Album::from_row,
        )
        .with_context(|| format!("failed to load album id={id}"))
    }

    pub fn load_all<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            "SELECT id, name, password FROM albums ORDER BY id",
            [],
            Album::from_row,
        )
        .context("failed to list albums")
    }

    pub fn load_for_collection<H: DbHandle>(db: &H, collection_id: i64) -> DbResult<Vec<Self>> {
        query_all(
            db,
            "SELECT a.id, a.name, a.password
             FROM albums a
             INNER JOIN albums_in_collections ac ON ac.album_id = a.id
             WHERE ac.collection_id = ?1
             ORDER BY a.id",
            params![collection_id],
            Album::from_row,
        )
        .with_context(|| format!("failed to list albums in collection id={collection_id}"))
    }

    pub fn rename<H: DbHandle>(db: &H, id: i64, name: &str) -> DbResult<()> {
        let changed = db
            .execute(
                "UPDATE albums SET name = ?1 WHERE id = ?2",
                params![name, id],
            )
            .with_context(|| format!("failed to rename album id={id}"))?;
        if changed == 0 {
            bail!("album id={id} does not exist");
        }
        Ok(())
    }

    /// Store (or clear, with `None`) the password digest.
    pub fn set_password<H: DbHandle>(db: &H, id: i64, digest: Option<&str>) -> DbResult<()> {
        let changed = db
            .execute(
                "UPDATE albums SET password = ?1 WHERE id = ?2",
                params![digest, id],
            )
            .with_context(|| format!("failed to update password of album id={id}"))?;
        if changed == 0 {
            bail!("album id={id} does not exist");
        }
        Ok(())
    }

    pub fn delete<H: DbHandle>(db: &H, id: i64) -> DbResult<()> {
        db.execute("DELETE FROM albums WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete album id={id}"))?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CatalogDb;

    #[test]
    fn insert_rename_and_lock() {
        let db = CatalogDb::in_memory().unwrap();
        let id = Album::new("Summer").insert(&db).unwrap();
        let other = Album::new("Summer").insert(&db).unwrap();
        assert_ne!(id, other);

        Album::rename(&db, id, "Summer 2019").unwrap();
        Album::set_password(&db, id, Some("00ff")).unwrap();
        let album = Album::load(&db, id).unwrap().unwrap();
        assert_eq!(album.name, "Summer 2019");
        assert!(album.locked());

        Album::set_password(&db, id, None).unwrap();
        assert!(!Album::load(&db, id).unwrap().unwrap().locked());
        assert!(Album::rename(&db, 999, "nope").is_err());
        assert!(Album::load(&db, 999).unwrap().is_none());
    }
}
