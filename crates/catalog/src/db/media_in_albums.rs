use crate::db::{DbHandle, DbResult};
use anyhow::Context;
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// Album membership of one medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediumInAlbum {
    pub album_id: i64,
    pub media_id: i64,
}

impl MediumInAlbum {
    /// Linking an existing pair again is a no-op.
    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT OR IGNORE INTO media_in_albums (album_id, media_id) VALUES (?1, ?2)",
            params![self.album_id, self.media_id],
        )
        .with_context(|| {
            format!(
                "failed to link medium {} to album {}",
                self.media_id, self.album_id
            )
        })?;
        Ok(())
    }

    pub fn delete<H: DbHandle>(db: &H, album_id: i64, media_id: i64) -> DbResult<()> {
        db.execute(
            "DELETE FROM media_in_albums WHERE album_id = ?1 AND media_id = ?2",
            params![album_id, media_id],
        )
        .with_context(|| format!("failed to unlink medium {media_id} from album {album_id}"))?;
        Ok(())
    }

    pub fn delete_for_album<H: DbHandle>(db: &H, album_id: i64) -> DbResult<usize> {
        db.execute(
            "DELETE FROM media_in_albums WHERE album_id = ?1",
            params![album_id],
        )
        .with_context(|| format!("failed to unlink media from album id={album_id}"))
    }

    pub fn delete_for_medium<H: DbHandle>(db: &H, media_id: i64) -> DbResult<usize> {
        db.execute(
            "DELETE FROM media_in_albums WHERE media_id = ?1",
            params![media_id],
        )
        .with_context(|| format!("failed to unlink medium id={media_id} from albums"))
    }
}
