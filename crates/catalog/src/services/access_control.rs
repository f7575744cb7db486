//! Album passwords.
//!
//! Digests are BLAKE3 in key-derivation mode over the row id followed by the
//! password, stored as 64 hex characters. Plaintext is never stored.

use anyhow::Result;
use blake3::{Hash, Hasher};
use tracing::{debug, warn};

use crate::db::{Album, Medium};

use super::CatalogService;

const ALBUM_CONTEXT: &str = "medieval catalog 2024-05-01 album password";
const COLLECTION_CONTEXT: &str = "medieval catalog 2024-05-01 collection password";

fn keyed_digest(context: &str, id: i64, password: &str) -> Hash {
    let mut hasher = Hasher::new_derive_key(context);
    hasher.update(&id.to_le_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

pub fn album_digest(album_id: i64, password: &str) -> String {
    keyed_digest(ALBUM_CONTEXT, album_id, password)
        .to_hex()
        .to_string()
}

pub fn collection_digest(collection_id: i64, password: &str) -> String {
    keyed_digest(COLLECTION_CONTEXT, collection_id, password)
        .to_hex()
        .to_string()
}

impl CatalogService {
    /// Lock the album, replacing any previous password.
    pub fn set_password(&self, album_id: i64, password: &str) -> Result<()> {
        let digest = album_digest(album_id, password);
        Album::set_password(&self.db, album_id, Some(&digest))
    }

    pub fn unset_password(&self, album_id: i64) -> Result<()> {
        Album::set_password(&self.db, album_id, None)
    }

    /// False for a wrong password, an unlocked album and a missing album alike;
    /// callers tell those apart through [`Album::locked`].
    pub fn validate_password(&self, album_id: i64, password: &str) -> Result<bool> {
        let Some(stored) = Album::load(&self.db, album_id)?.and_then(|album| album.password)
        else {
            return Ok(false);
        };
        match Hash::from_hex(stored.as_bytes()) {
            Ok(expected) => Ok(expected == keyed_digest(ALBUM_CONTEXT, album_id, password)),
            Err(err) => {
                warn!("album id={album_id} has a malformed password digest: {err}");
                Ok(false)
            }
        }
    }

    /// Media on the timeline, or in one album.
    ///
    /// A locked album yields its media only when `password` validates;
    /// otherwise the result is empty, as it is for an unknown album.
    pub fn query_media(&self, album_id: Option<i64>, password: Option<&str>) -> Result<Vec<Medium>> {
        let Some(album_id) = album_id else {
            return Medium::load_all(&self.db);
        };
        let Some(album) = Album::load(&self.db, album_id)? else {
            debug!("album id={album_id} does not exist");
            return Ok(Vec::new());
        };

        if album.locked() {
            let unlocked = match password {
                Some(password) => self.validate_password(album_id, password)?,
                None => false,
            };
            if !unlocked {
                debug!("album id={album_id} is locked, withholding its media");
                return Ok(Vec::new());
            }
        }
        Medium::load_for_album(&self.db, album_id)
    }
}
