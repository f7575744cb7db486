pub mod access_control;
pub mod catalog_service;

pub use access_control::{album_digest, collection_digest};
pub use catalog_service::{AlbumUpdate, CatalogService, PasswordChange};
