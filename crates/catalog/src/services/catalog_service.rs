use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::db::{
    Album, AlbumInCollection, CatalogDb, Collection, Medium, MediumInAlbum,
};
use crate::schema;

use super::access_control::{album_digest, collection_digest};

/// A password edit carried by [`AlbumUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChange {
    /// Hash and store a new plaintext password.
    Set(String),
    /// Unlock the album.
    Clear,
}

/// Partial album update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumUpdate {
    pub name: Option<String>,
    pub password: Option<PasswordChange>,
}

impl AlbumUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            password: None,
        }
    }

    pub fn password(change: PasswordChange) -> Self {
        Self {
            name: None,
            password: Some(change),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.password.is_none()
    }
}

/// High-level catalog operations that sit above the raw ORM bindings.
///
/// Every mutating call commits before returning; calls spanning several
/// statements run inside one transaction.
pub struct CatalogService {
    pub db: CatalogDb,
}

impl CatalogService {
    pub fn new(db: CatalogDb) -> Self {
        Self { db }
    }

    pub fn create_schema(&self, overwrite: bool) -> Result<()> {
        schema::create_schema(self.db.conn(), overwrite).context("failed to create catalog schema")
    }

    pub fn add_medium(&self, medium: &Medium) -> Result<i64> {
        let id = medium.insert(&self.db)?;
        debug!("cataloged {} as medium id={id}", medium.filename);
        Ok(id)
    }

    /// Removes the medium and its album links. The thumbnail file stays on disk.
    pub fn remove_medium(&mut self, medium_id: i64) -> Result<()> {
        let tx = self.db.transaction()?;
        MediumInAlbum::delete_for_medium(&tx, medium_id)?;
        Medium::delete(&tx, medium_id)?;
        tx.commit()
            .with_context(|| format!("failed to remove medium id={medium_id}"))?;
        Ok(())
    }

    pub fn find_medium_by_filename(&self, filename: &str) -> Result<Option<Medium>> {
        Medium::find_by_filename(&self.db, filename)
    }

    /// The given media in timeline order. An empty id list never touches the store.
    pub fn media_by_ids(&self, ids: &[i64]) -> Result<Vec<Medium>> {
        Medium::load_by_ids(&self.db, ids)
    }

    pub fn count_media(&self) -> Result<i64> {
        Medium::count(&self.db)
    }

    pub fn add_album(&mut self, name: &str, password: Option<&str>) -> Result<Album> {
        let tx = self.db.transaction()?;
        let mut album = Album::new(name);
        album.id = album.insert(&tx)?;
        if let Some(password) = password {
            let digest = album_digest(album.id, password);
            Album::set_password(&tx, album.id, Some(&digest))?;
            album.password = Some(digest);
        }
        tx.commit()
            .with_context(|| format!("failed to create album {name}"))?;
        info!("created album {name} (id={})", album.id);
        Ok(album)
    }

    pub fn rename_or_update_album(&mut self, album_id: i64, update: AlbumUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        let tx = self.db.transaction()?;
        if let Some(name) = update.name.as_deref() {
            Album::rename(&tx, album_id, name)?;
        }
        match update.password {
            Some(PasswordChange::Set(password)) => {
                let digest = album_digest(album_id, &password);
                Album::set_password(&tx, album_id, Some(&digest))?;
            }
            Some(PasswordChange::Clear) => Album::set_password(&tx, album_id, None)?,
            None => {}
        }
        tx.commit()
            .with_context(|| format!("failed to update album id={album_id}"))?;
        Ok(())
    }

    /// Drops the album after removing every link that references it.
    pub fn delete_album(&mut self, album_id: i64) -> Result<()> {
        let tx = self.db.transaction()?;
        let media = MediumInAlbum::delete_for_album(&tx, album_id)?;
        let collections = AlbumInCollection::delete_for_album(&tx, album_id)?;
        Album::delete(&tx, album_id)?;
        tx.commit()
            .with_context(|| format!("failed to delete album id={album_id}"))?;
        info!("deleted album id={album_id} ({media} media links, {collections} collection links)");
        Ok(())
    }

    pub fn add_collection(&mut self, name: &str, password: Option<&str>) -> Result<Collection> {
        let tx = self.db.transaction()?;
        let mut collection = Collection::new(name);
        collection.id = collection.insert(&tx)?;
        if let Some(password) = password {
            let digest = collection_digest(collection.id, password);
            Collection::set_password(&tx, collection.id, Some(&digest))?;
            collection.password = Some(digest);
        }
        tx.commit()
            .with_context(|| format!("failed to create collection {name}"))?;
        info!("created collection {name} (id={})", collection.id);
        Ok(collection)
    }

    pub fn rename_collection(&self, collection_id: i64, name: &str) -> Result<()> {
        Collection::rename(&self.db, collection_id, name)
    }

    pub fn delete_collection(&mut self, collection_id: i64) -> Result<()> {
        let tx = self.db.transaction()?;
        AlbumInCollection::delete_for_collection(&tx, collection_id)?;
        Collection::delete(&tx, collection_id)?;
        tx.commit()
            .with_context(|| format!("failed to delete collection id={collection_id}"))?;
        Ok(())
    }

    pub fn link_medium_to_album(&self, medium_id: i64, album_id: i64) -> Result<()> {
        MediumInAlbum {
            album_id,
            media_id: medium_id,
        }
        .insert(&self.db)
    }

    pub fn unlink_medium_from_album(&self, medium_id: i64, album_id: i64) -> Result<()> {
        MediumInAlbum::delete(&self.db, album_id, medium_id)
    }

    pub fn link_album_to_collection(&self, album_id: i64, collection_id: i64) -> Result<()> {
        AlbumInCollection {
            collection_id,
            album_id,
        }
        .insert(&self.db)
    }

    pub fn unlink_album_from_collection(&self, album_id: i64, collection_id: i64) -> Result<()> {
        AlbumInCollection::delete(&self.db, collection_id, album_id)
    }

    pub fn query_albums(&self) -> Result<Vec<Album>> {
        Album::load_all(&self.db)
    }

    pub fn query_album(&self, album_id: i64) -> Result<Option<Album>> {
        Album::load(&self.db, album_id)
    }

    pub fn query_collections(&self) -> Result<Vec<Collection>> {
        Collection::load_all(&self.db)
    }

    pub fn query_albums_in_collection(&self, collection_id: i64) -> Result<Vec<Album>> {
        if Collection::load(&self.db, collection_id)?.is_none() {
            bail!("collection id={collection_id} does not exist");
        }
        Album::load_for_collection(&self.db, collection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{MediaKind, MediaMetadata};

    fn service_with_fresh_db() -> CatalogService {
        CatalogService::new(CatalogDb::in_memory().unwrap())
    }

    fn add(service: &CatalogService, filename: &str) -> i64 {
        let mut metadata = MediaMetadata::empty(MediaKind::Image);
        metadata.timestamp = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let thumbnail = filename.replace('/', "_");
        service
            .add_medium(&Medium::from_metadata(filename, thumbnail, "image/jpeg", &metadata))
            .unwrap()
    }

    #[test]
    fn delete_album_cascades_links() {
        let mut service = service_with_fresh_db();
        let one = add(&service, "/p/1.jpg");
        let two = add(&service, "/p/2.jpg");
        let album = service.add_album("Trip", None).unwrap();
        let collection = service.add_collection("Travel", None).unwrap();
        service.link_medium_to_album(one, album.id).unwrap();
        service.link_medium_to_album(two, album.id).unwrap();
        service.link_album_to_collection(album.id, collection.id).unwrap();

        service.delete_album(album.id).unwrap();

        assert!(service.query_albums().unwrap().is_empty());
        assert!(Medium::load_for_album(&service.db, album.id)
            .unwrap()
            .is_empty());
        assert!(service
            .query_albums_in_collection(collection.id)
            .unwrap()
            .is_empty());
        assert_eq!(service.count_media().unwrap(), 2);
    }

    #[test]
    fn linking_twice_keeps_one_membership() {
        let service = service_with_fresh_db();
        let medium = add(&service, "/p/1.jpg");
        let album = Album::new("A").insert(&service.db).unwrap();
        service.link_medium_to_album(medium, album).unwrap();
        service.link_medium_to_album(medium, album).unwrap();
        assert_eq!(Medium::load_for_album(&service.db, album).unwrap().len(), 1);

        service.unlink_medium_from_album(medium, album).unwrap();
        assert!(Medium::load_for_album(&service.db, album)
            .unwrap()
            .is_empty());
        assert_eq!(service.count_media().unwrap(), 1);
    }

    #[test]
    fn links_to_missing_rows_are_rejected() {
        let service = service_with_fresh_db();
        let album = Album::new("A").insert(&service.db).unwrap();
        assert!(service.link_medium_to_album(42, album).is_err());
    }

    #[test]
    fn remove_medium_drops_its_memberships() {
        let mut service = service_with_fresh_db();
        let medium = add(&service, "/p/1.jpg");
        let album = service.add_album("A", None).unwrap();
        service.link_medium_to_album(medium, album.id).unwrap();

        service.remove_medium(medium).unwrap();
        assert_eq!(service.count_media().unwrap(), 0);
        assert!(service.find_medium_by_filename("/p/1.jpg").unwrap().is_none());
        assert!(Medium::load_for_album(&service.db, album.id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn album_updates_are_partial() {
        let mut service = service_with_fresh_db();
        let album = service.add_album("Old", Some("secret")).unwrap();
        assert!(album.locked());

        service
            .rename_or_update_album(album.id, AlbumUpdate::rename("New"))
            .unwrap();
        let loaded = service.query_album(album.id).unwrap().unwrap();
        assert_eq!(loaded.name, "New");
        assert!(loaded.locked());

        service
            .rename_or_update_album(album.id, AlbumUpdate::password(PasswordChange::Clear))
            .unwrap();
        assert!(!service.query_album(album.id).unwrap().unwrap().locked());
        assert!(service
            .rename_or_update_album(99, AlbumUpdate::rename("ghost"))
            .is_err());
    }

    #[test]
    fn collections_rename_delete_and_list_albums() {
        let mut service = service_with_fresh_db();
        let collection = service.add_collection("Family", Some("legacy")).unwrap();
        assert!(collection.password.is_some());
        let a = service.add_album("A", None).unwrap();
        let b = service.add_album("B", None).unwrap();
        service.link_album_to_collection(a.id, collection.id).unwrap();
        service.link_album_to_collection(b.id, collection.id).unwrap();
        service.unlink_album_from_collection(a.id, collection.id).unwrap();

        let names: Vec<String> = service
            .query_albums_in_collection(collection.id)
            .unwrap()
            .into_iter()
            .map(|album| album.name)
            .collect();
        assert_eq!(names, vec!["B"]);

        service.rename_collection(collection.id, "Relatives").unwrap();
        assert_eq!(service.query_collections().unwrap()[0].name, "Relatives");

        service.delete_collection(collection.id).unwrap();
        assert!(service.query_collections().unwrap().is_empty());
        assert_eq!(service.query_albums().unwrap().len(), 2);
        assert!(service.query_albums_in_collection(collection.id).is_err());
    }

    #[test]
    fn overwrite_empties_the_catalog() {
        let service = service_with_fresh_db();
        add(&service, "/p/1.jpg");
        service.create_schema(false).unwrap();
        assert_eq!(service.count_media().unwrap(), 1);
        service.create_schema(true).unwrap();
        assert_eq!(service.count_media().unwrap(), 0);
    }
}
