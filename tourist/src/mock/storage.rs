//! Test mock for storage
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;
use crate::models::{Coordinate, DownloadStatus, Photo, Pin, SearchPhoto};
use crate::storage::{Storage, StorageImpl};

/// Delegates to [`StorageImpl`], sleeping before every `save_photos`.
#[derive(Debug, Clone)]
pub struct SlowStorage {
    inner: StorageImpl,
    save_delay: Duration,
}

impl SlowStorage {
    pub fn new(inner: StorageImpl, save_delay: Duration) -> Self {
        Self { inner, save_delay }
    }
}

impl Storage for SlowStorage {
    async fn save_pin(&self, coordinate: Coordinate) -> Result<Pin> {
        self.inner.save_pin(coordinate).await
    }

    async fn get_pin(&self, id: i64) -> Result<Option<Pin>> {
        self.inner.get_pin(id).await
    }

    async fn find_pin(&self, coordinate: Coordinate) -> Result<Option<Pin>> {
        self.inner.find_pin(coordinate).await
    }

    async fn get_pins(&self) -> Result<Vec<Pin>> {
        self.inner.get_pins().await
    }

    async fn delete_pin(&self, id: i64) -> Result<Option<usize>> {
        self.inner.delete_pin(id).await
    }

    async fn save_photos(&self, pin_id: i64, photos: &[SearchPhoto]) -> Result<Vec<Photo>> {
        tokio::time::sleep(self.save_delay).await;
        self.inner.save_photos(pin_id, photos).await
    }

    async fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
        self.inner.get_photo(id).await
    }

    async fn get_photos(&self, pin_id: i64) -> Result<Vec<Photo>> {
        self.inner.get_photos(pin_id).await
    }

    async fn delete_photo(&self, id: i64) -> Result<bool> {
        self.inner.delete_photo(id).await
    }

    async fn delete_photos_of_pin(&self, pin_id: i64) -> Result<usize> {
        self.inner.delete_photos_of_pin(pin_id).await
    }

    async fn save_photo_image(&self, photo: &Photo, blob: Bytes) -> Result<bool> {
        self.inner.save_photo_image(photo, blob).await
    }

    async fn get_photo_image(&self, photo: &Photo) -> Result<Option<Bytes>> {
        self.inner.get_photo_image(photo).await
    }

    async fn download_status(&self, pin_id: i64) -> Result<DownloadStatus> {
        self.inner.download_status(pin_id).await
    }
}
