//! ORM-style bindings for the catalog SQLite schema.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, Transaction};

pub mod albums;
pub mod albums_in_collections;
pub mod collections;
pub mod db;
pub mod media;
pub mod media_in_albums;

pub use albums::Album;
pub use albums_in_collections::AlbumInCollection;
pub use collections::Collection;
pub use db::CatalogDb;
pub use media::Medium;
pub use media_in_albums::MediumInAlbum;

pub type DbResult<T> = anyhow::Result<T>;

/// Common trait allowing modules to operate over either a `Connection` or `Transaction`.
pub trait DbHandle {
    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<usize>;
    fn prepare<'a>(&'a self, sql: &str) -> rusqlite::Result<rusqlite::Statement<'a>>;
    fn last_insert_rowid(&self) -> i64;
}

impl DbHandle for Connection {
    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<usize> {
        Connection::execute(self, sql, params)
    }

    fn prepare<'a>(&'a self, sql: &str) -> rusqlite::Result<rusqlite::Statement<'a>> {
        Connection::prepare(self, sql)
    }

    fn last_insert_rowid(&self) -> i64 {
        Connection::last_insert_rowid(self)
    }
}

impl<'a> DbHandle for Transaction<'a> {
    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<usize> {
        (**self).execute(sql, params)
    }

    fn prepare<'a_stmt>(
        &'a_stmt self,
        sql: &str,
    ) -> rusqlite::Result<rusqlite::Statement<'a_stmt>> {
        (**self).prepare(sql)
    }

    fn last_insert_rowid(&self) -> i64 {
        (**self).last_insert_rowid()
    }
}

/// Map a single row result to a typed value, returning an error when no rows are present.
pub fn query_one<T, H, P, F>(db: &H, sql: &str, params: P, map: F) -> DbResult<T>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnOnce(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let row = rows.next()?.context("query returned no rows")?;
    map(row)
}

/// Map at most one row result to a typed value.
pub fn query_optional<T, H, P, F>(db: &H, sql: &str, params: P, mut map: F) -> DbResult<Option<T>>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnMut(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map(row)?)),
        None => Ok(None),
    }
}

/// Collect all rows from a query into a vector.
pub fn query_all<T, H, P, F>(db: &H, sql: &str, params: P, mut map: F) -> DbResult<Vec<T>>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnMut(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(map(row)?);
    }
    Ok(out)
}

/// `?1, ?2, ... ?n` for binding an `IN (...)` list.
pub fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Millisecond precision keeps lexical order equal to chronological order.
pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn to_rfc3339_opt(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(to_rfc3339)
}

pub fn parse_datetime(raw: String, field: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} timestamp: {raw}"))
}

pub fn parse_datetime_opt(raw: Option<String>, field: &str) -> DbResult<Option<DateTime<Utc>>> {
    raw.map(|value| parse_datetime(value, field)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn placeholders_are_numbered_from_one() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(3), "?1, ?2, ?3");
    }

    #[test]
    fn timestamps_round_trip_with_millis() {
        let ts = Utc.with_ymd_and_hms(2019, 5, 5, 10, 11, 12).unwrap();
        let raw = to_rfc3339(ts);
        assert_eq!(raw, "2019-05-05T10:11:12.000Z");
        assert_eq!(parse_datetime(raw, "timestamp").unwrap(), ts);
        assert!(parse_datetime_opt(None, "timestamp").unwrap().is_none());
        assert!(parse_datetime("garbage".into(), "timestamp").is_err());
    }
}
