use crate::db::{
    parse_datetime_opt, placeholders, query_all, query_one, query_optional, to_rfc3339_opt,
    DbHandle, DbResult,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use core_types::{MediaMetadata, UNKNOWN};
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Serialize};

const COLUMNS: &str =
    "m.id, m.filename, m.thumbnail, m.mimetype, m.timestamp, m.width, m.height, m.orientation, m.make, m.model";

/// Nulls sort after every dated row; catalog id breaks ties.
const TIMELINE_ORDER: &str = "ORDER BY m.timestamp IS NULL, m.timestamp, m.id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub id: i64,
    /// Absolute source path.
    pub filename: String,
    pub thumbnail: String,
    pub mimetype: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub width: i64,
    pub height: i64,
    pub orientation: i64,
    pub make: String,
    pub model: String,
}

impl Medium {
    /// An unsaved row (`id == 0`) for a freshly extracted file.
    pub fn from_metadata(
        filename: impl Into<String>,
        thumbnail: impl Into<String>,
        mimetype: impl Into<String>,
        metadata: &MediaMetadata,
    ) -> Self {
        Self {
            id: 0,
            filename: filename.into(),
            thumbnail: thumbnail.into(),
            mimetype: mimetype.into(),
            timestamp: metadata.timestamp,
            width: metadata.width,
            height: metadata.height,
            orientation: metadata.orientation,
            make: metadata.make.clone(),
            model: metadata.model.clone(),
        }
    }

    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO media (
                filename, thumbnail, mimetype, timestamp, width, height, orientation, make, model
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.filename,
                self.thumbnail,
                self.mimetype,
                to_rfc3339_opt(self.timestamp),
                self.width,
                self.height,
                self.orientation,
                self.make,
                self.model
            ],
        )
        .with_context(|| format!("failed to insert medium filename={}", self.filename))?;
        Ok(db.last_insert_rowid())
    }

    pub fn load<H: DbHandle>(db: &H, id: i64) -> DbResult<Self> {
        query_one(
            db,
            &format!("SELECT {COLUMNS} FROM media m WHERE m.id = ?1"),
            params![id],
            Medium::from_row,
        )
        .with_context(|| format!("failed to load medium id={id}"))
    }

    /// Every medium on the timeline.
    pub fn load_all<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            &format!("SELECT {COLUMNS} FROM media m {TIMELINE_ORDER}"),
            [],
            Medium::from_row,
        )
        .context("failed to list media")
    }

    pub fn find_by_filename<H: DbHandle>(db: &H, filename: &str) -> DbResult<Option<Self>> {
        query_optional(
            db,
            &format!("SELECT {COLUMNS} FROM media m WHERE m.filename = ?1"),
            params![filename],
            Medium::from_row,
        )
        .with_context(|| format!("failed to look up medium filename={filename}"))
    }

    pub fn load_by_ids<H: DbHandle>(db: &H, ids: &[i64]) -> DbResult<Vec<Self>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        query_all(
            db,
            &format!(
                "SELECT {COLUMNS} FROM media m WHERE m.id IN ({}) {TIMELINE_ORDER}",
                placeholders(ids.len())
            ),
            params_from_iter(ids.iter()),
            Medium::from_row,
        )
        .with_context(|| format!("failed to load {} media by id", ids.len()))
    }

    pub fn load_for_album<H: DbHandle>(db: &H, album_id: i64) -> DbResult<Vec<Self>> {
        query_all(
            db,
            &format!(
                "SELECT {COLUMNS}
                 FROM media m
                 INNER JOIN media_in_albums ma ON ma.media_id = m.id
                 WHERE ma.album_id = ?1
                 {TIMELINE_ORDER}"
            ),
            params![album_id],
            Medium::from_row,
        )
        .with_context(|| format!("failed to list media for album id={album_id}"))
    }

    pub fn count<H: DbHandle>(db: &H) -> DbResult<i64> {
        query_one(db, "SELECT COUNT(*) FROM media", [], |row| {
            Ok(row.get::<_, i64>(0)?)
        })
        .context("failed to count media")
    }

    pub fn delete<H: DbHandle>(db: &H, id: i64) -> DbResult<()> {
        db.execute("DELETE FROM media WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete medium id={id}"))?;
        Ok(())
    }

    fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            filename: row.get(1)?,
            thumbnail: row.get(2)?,
            mimetype: row.get(3)?,
            timestamp: parse_datetime_opt(row.get(4)?, "timestamp")?,
            width: row.get::<_, Option<i64>>(5)?.unwrap_or(UNKNOWN),
            height: row.get::<_, Option<i64>>(6)?.unwrap_or(UNKNOWN),
            orientation: row.get::<_, Option<i64>>(7)?.unwrap_or(UNKNOWN),
            make: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            model: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CatalogDb;
    use chrono::TimeZone;
    use core_types::MediaKind;

    fn medium(filename: &str, thumbnail: &str, timestamp: Option<DateTime<Utc>>) -> Medium {
        let mut metadata = MediaMetadata::empty(MediaKind::Image);
        metadata.timestamp = timestamp;
        Medium::from_metadata(filename, thumbnail, "image/jpeg", &metadata)
    }

    #[test]
    fn timeline_puts_undated_media_last() {
        let db = CatalogDb::in_memory().unwrap();
        let newer = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2019, 5, 5, 0, 0, 0).unwrap();
        let a = medium("/p/a.jpg", "aaaa", Some(newer)).insert(&db).unwrap();
        let b = medium("/p/b.jpg", "bbbb", Some(older)).insert(&db).unwrap();
        let c = medium("/p/c.jpg", "cccc", None).insert(&db).unwrap();

        let ids: Vec<i64> = Medium::load_all(&db).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b, a, c]);

        let subset: Vec<i64> = Medium::load_by_ids(&db, &[c, a])
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(subset, vec![a, c]);
        assert!(Medium::load_by_ids(&db, &[]).unwrap().is_empty());
    }

    #[test]
    fn sentinels_survive_a_round_trip() {
        let db = CatalogDb::in_memory().unwrap();
        let id = medium("/p/x.png", "xxxx", None).insert(&db).unwrap();
        let loaded = Medium::load(&db, id).unwrap();
        assert_eq!(loaded.width, UNKNOWN);
        assert_eq!(loaded.orientation, UNKNOWN);
        assert_eq!(loaded.make, "");
        assert_eq!(loaded.timestamp, None);
        assert_eq!(
            Medium::find_by_filename(&db, "/p/x.png").unwrap().map(|m| m.id),
            Some(id)
        );
        assert!(Medium::find_by_filename(&db, "/p/y.png").unwrap().is_none());
    }

    #[test]
    fn filenames_and_thumbnails_are_unique() {
        let db = CatalogDb::in_memory().unwrap();
        medium("/p/a.jpg", "t1", None).insert(&db).unwrap();
        assert!(medium("/p/a.jpg", "t2", None).insert(&db).is_err());
        assert!(medium("/p/b.jpg", "t1", None).insert(&db).is_err());
        assert_eq!(Medium::count(&db).unwrap(), 1);
    }
}
