use crate::db::{DbHandle, DbResult};
use anyhow::Context;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInCollection {
    pub collection_id: i64,
    pub album_id: i64,
}

impl AlbumInCollection {
    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT OR IGNORE INTO albums_in_collections (collection_id, album_id) VALUES (?1, ?2)",
            params![self.collection_id, self.album_id],
        )
        .with_context(|| {
            format!(
                "failed to link album {} to collection {}",
                self.album_id, self.collection_id
            )
        })?;
        Ok(())
    }

    pub fn delete<H: DbHandle>(db: &H, collection_id: i64, album_id: i64) -> DbResult<()> {
        db.execute(
            "DELETE FROM albums_in_collections WHERE collection_id = ?1 AND album_id = ?2",
            params![collection_id, album_id],
        )
        .with_context(|| {
            format!("failed to unlink album {album_id} from collection {collection_id}")
        })?;
        Ok(())
    }

    pub fn delete_for_collection<H: DbHandle>(db: &H, collection_id: i64) -> DbResult<usize> {
        db.execute(
            "DELETE FROM albums_in_collections WHERE collection_id = ?1",
            params![collection_id],
        )
        .with_context(|| format!("failed to unlink albums from collection id={collection_id}"))
    }

    pub fn delete_for_album<H: DbHandle>(db: &H, album_id: i64) -> DbResult<usize> {
        db.execute(
            "DELETE FROM albums_in_collections WHERE album_id = ?1",
            params![album_id],
        )
        .with_context(|| format!("failed to unlink album id={album_id} from collections"))
    }
}
