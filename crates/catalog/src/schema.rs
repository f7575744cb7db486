//! SQLite schema DDL and helpers for catalog initialization.

use rusqlite::{Connection, Error as SqliteError, ErrorCode};
use tracing::info;

/// SQLite schema version supported by this build.
pub const TARGET_SCHEMA_VERSION: i64 = 1;

/// Tables in drop order: link tables before the tables they reference.
const DROP_ORDER: [&str; 5] = [
    "albums_in_collections",
    "media_in_albums",
    "media",
    "collections",
    "albums",
];

pub const CATALOG_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS media (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL UNIQUE,
    thumbnail TEXT NOT NULL UNIQUE,
    mimetype TEXT NOT NULL,
    timestamp TEXT,
    width INTEGER,
    height INTEGER,
    orientation INTEGER,
    make TEXT,
    model TEXT
);

CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    password TEXT
);

CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    password TEXT
);

CREATE TABLE IF NOT EXISTS media_in_albums (
    album_id INTEGER NOT NULL REFERENCES albums(id),
    media_id INTEGER NOT NULL REFERENCES media(id),
    UNIQUE (album_id, media_id)
);

CREATE TABLE IF NOT EXISTS albums_in_collections (
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    album_id INTEGER NOT NULL REFERENCES albums(id),
    UNIQUE (collection_id, album_id)
);

CREATE INDEX IF NOT EXISTS idx_media_timestamp ON media(timestamp);
CREATE INDEX IF NOT EXISTS idx_media_in_albums_media ON media_in_albums(media_id);
CREATE INDEX IF NOT EXISTS idx_albums_in_collections_album ON albums_in_collections(album_id);
"#;

/// Enables foreign keys and brings the catalog up to [`TARGET_SCHEMA_VERSION`].
///
/// Catalogs written by a newer build are rejected rather than modified.
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    let user_version = schema_version(conn)?;
    if user_version > TARGET_SCHEMA_VERSION {
        return Err(newer_schema_error(user_version));
    }

    conn.execute_batch(CATALOG_SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", TARGET_SCHEMA_VERSION)?;
    Ok(())
}

/// Creates every table that is missing. With `overwrite`, all catalog tables
/// are dropped first, so the catalog comes back empty.
pub fn create_schema(conn: &Connection, overwrite: bool) -> rusqlite::Result<()> {
    if overwrite {
        info!("dropping catalog tables");
        for table in DROP_ORDER {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
        }
    }
    initialize_schema(conn)
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn newer_schema_error(version: i64) -> SqliteError {
    SqliteError::SqliteFailure(
        rusqlite::ffi::Error {
            code: ErrorCode::DatabaseCorrupt,
            extended_code: 0,
        },
        Some(format!(
            "catalog schema version {version} is newer than supported {TARGET_SCHEMA_VERSION}"
        )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let rows = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
        rows.map(|row| row.unwrap()).collect()
    }

    #[test]
    fn creates_all_tables_and_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(
            table_names(&conn),
            vec![
                "albums",
                "albums_in_collections",
                "collections",
                "media",
                "media_in_albums"
            ]
        );
        assert_eq!(schema_version(&conn).unwrap(), TARGET_SCHEMA_VERSION);
    }

    #[test]
    fn create_is_idempotent_and_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn, false).unwrap();
        conn.execute("INSERT INTO albums (name) VALUES ('trip')", [])
            .unwrap();
        create_schema(&conn, false).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn overwrite_drops_linked_tables_with_foreign_keys_on() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn, false).unwrap();
        conn.execute_batch(
            "INSERT INTO albums (id, name) VALUES (1, 'a');
             INSERT INTO media (id, filename, thumbnail, mimetype) VALUES (1, '/x.jpg', 't', 'image/jpeg');
             INSERT INTO media_in_albums (album_id, media_id) VALUES (1, 1);",
        )
        .unwrap();

        create_schema(&conn, true).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(table_names(&conn).len(), 5);
    }

    #[test]
    fn newer_catalogs_are_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 7).unwrap();
        assert!(initialize_schema(&conn).is_err());
    }
}
