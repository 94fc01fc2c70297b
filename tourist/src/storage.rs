pub mod database;
pub mod image_cache;
pub mod internal;

use std::future::Future;

use bytes::Bytes;
use log::{debug, error, info, warn};
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::{Coordinate, DownloadStatus, Photo, Pin, SearchPhoto};
use crate::utils::cache_file_name;
pub use image_cache::FileSystemImageCache;
use internal::{photo, pin};

const VALID_DB_VERSION: i64 = 1;

pub trait Storage: Send + Sync + Clone + 'static {
    /// Returns the pin at `coordinate`, creating it when missing.
    fn save_pin(&self, coordinate: Coordinate) -> impl Future<Output = Result<Pin>> + Send;
    fn get_pin(&self, id: i64) -> impl Future<Output = Result<Option<Pin>>> + Send;
    fn find_pin(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Option<Pin>>> + Send;
    fn get_pins(&self) -> impl Future<Output = Result<Vec<Pin>>> + Send;
    /// Deletes the pin with its photos and their cached files. Returns the
    /// number of photos removed, or `None` if there was no such pin.
    fn delete_pin(&self, id: i64) -> impl Future<Output = Result<Option<usize>>> + Send;
    fn save_photos(
        &self,
        pin_id: i64,
        photos: &[SearchPhoto],
    ) -> impl Future<Output = Result<Vec<Photo>>> + Send;
    fn get_photo(&self, id: i64) -> impl Future<Output = Result<Option<Photo>>> + Send;
    fn get_photos(&self, pin_id: i64) -> impl Future<Output = Result<Vec<Photo>>> + Send;
    fn delete_photo(&self, id: i64) -> impl Future<Output = Result<bool>> + Send;
    fn delete_photos_of_pin(&self, pin_id: i64) -> impl Future<Output = Result<usize>> + Send;
    /// Caches the image of a photo and marks it downloaded. Returns `false`
    /// without writing anything when the photo record no longer exists.
    fn save_photo_image(
        &self,
        photo: &Photo,
        blob: Bytes,
    ) -> impl Future<Output = Result<bool>> + Send;
    fn get_photo_image(
        &self,
        photo: &Photo,
    ) -> impl Future<Output = Result<Option<Bytes>>> + Send;
    fn download_status(&self, pin_id: i64) -> impl Future<Output = Result<DownloadStatus>> + Send;
}

#[derive(Debug, Clone)]
pub struct StorageImpl {
    db_pool: SqlitePool,
    image_cache: FileSystemImageCache,
}

impl StorageImpl {
    pub fn new(db_pool: SqlitePool, image_cache: FileSystemImageCache) -> Self {
        info!(
            "Storage initialized, images cached in {:?}",
            image_cache.root()
        );
        Self {
            db_pool,
            image_cache,
        }
    }

    pub fn image_cache(&self) -> &FileSystemImageCache {
        &self.image_cache
    }

    /// Removes cached files no photo record refers to anymore.
    async fn release_files(&self, file_names: Vec<String>) -> Result<()> {
        for file_name in file_names {
            let references = photo::count_file_references(&self.db_pool, &file_name).await?;
            if references > 0 {
                debug!("cached image {file_name} still used by {references} photos");
                continue;
            }
            self.image_cache.delete(&file_name).await;
        }
        Ok(())
    }
}

impl Storage for StorageImpl {
    async fn save_pin(&self, coordinate: Coordinate) -> Result<Pin> {
        pin::save_pin(&self.db_pool, coordinate).await?;
        pin::get_pin_by_coordinate(&self.db_pool, coordinate)
            .await?
            .ok_or_else(|| Error::DbError(format!("pin at {coordinate} vanished after insert")))
    }

    async fn get_pin(&self, id: i64) -> Result<Option<Pin>> {
        pin::get_pin(&self.db_pool, id).await
    }

    async fn find_pin(&self, coordinate: Coordinate) -> Result<Option<Pin>> {
        pin::get_pin_by_coordinate(&self.db_pool, coordinate).await
    }

    async fn get_pins(&self) -> Result<Vec<Pin>> {
        pin::get_pins(&self.db_pool).await
    }

    async fn delete_pin(&self, id: i64) -> Result<Option<usize>> {
        let mut tx = self.db_pool.begin().await?;
        let file_names = photo::delete_photos_by_pin_id(&mut *tx, id).await?;
        let deleted = pin::delete_pin(&mut *tx, id).await?;
        tx.commit().await?;

        let removed = file_names.len();
        self.release_files(file_names).await?;
        if deleted {
            info!("pin {id} deleted with {removed} photos");
            Ok(Some(removed))
        } else {
            warn!("no pin {id} to delete");
            Ok(None)
        }
    }

    async fn save_photos(&self, pin_id: i64, photos: &[SearchPhoto]) -> Result<Vec<Photo>> {
        let mut tx = self.db_pool.begin().await?;
        let mut saved = Vec::with_capacity(photos.len());
        for search_photo in photos {
            let file_name = cache_file_name(&search_photo.id, &search_photo.url_m)?;
            let id = photo::save_photo(
                &mut *tx,
                pin_id,
                &search_photo.id,
                &search_photo.url_m,
                &file_name,
            )
            .await
            .map_err(|e| {
                error!("Failed to save photo {} of pin {pin_id}: {e}", search_photo.id);
                e
            })?;
            saved.push(Photo {
                id,
                pin_id,
                photo_id: search_photo.id.clone(),
                url: search_photo.url_m.clone(),
                file_name,
                downloaded: false,
            });
        }
        tx.commit().await?;
        debug!("saved {} photos for pin {pin_id}", saved.len());
        Ok(saved)
    }

    async fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
        photo::get_photo(&self.db_pool, id).await
    }

    async fn get_photos(&self, pin_id: i64) -> Result<Vec<Photo>> {
        photo::get_photos_by_pin_id(&self.db_pool, pin_id).await
    }

    async fn delete_photo(&self, id: i64) -> Result<bool> {
        let Some(file_name) = photo::delete_photo(&self.db_pool, id).await? else {
            return Ok(false);
        };
        self.release_files(vec![file_name]).await?;
        debug!("photo {id} deleted");
        Ok(true)
    }

    async fn delete_photos_of_pin(&self, pin_id: i64) -> Result<usize> {
        let file_names = photo::delete_photos_by_pin_id(&self.db_pool, pin_id).await?;
        let removed = file_names.len();
        self.release_files(file_names).await?;
        debug!("{removed} photos of pin {pin_id} deleted");
        Ok(removed)
    }

    async fn save_photo_image(&self, photo: &Photo, blob: Bytes) -> Result<bool> {
        if photo::get_photo(&self.db_pool, photo.id).await?.is_none() {
            debug!("photo {} was deleted, dropping its image", photo.id);
            return Ok(false);
        }
        self.image_cache.save(&photo.file_name, &blob).await?;
        let marked = photo::mark_downloaded(&self.db_pool, photo.id).await?;
        if !marked {
            // Deleted while the file was written.
            self.release_files(vec![photo.file_name.clone()]).await?;
        }
        Ok(marked)
    }

    async fn get_photo_image(&self, photo: &Photo) -> Result<Option<Bytes>> {
        self.image_cache.load(&photo.file_name).await
    }

    async fn download_status(&self, pin_id: i64) -> Result<DownloadStatus> {
        photo::get_download_status(&self.db_pool, pin_id).await
    }
}
