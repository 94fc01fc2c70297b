pub mod pipeline;
pub mod task;
pub mod task_manager;

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info};

use crate::api::FlickrClient;
use crate::error::{Error, Result};
use crate::media_downloader::MediaDownloaderHandle;
use crate::models::{Coordinate, DownloadStatus, Photo, Pin};
use crate::storage::{Storage, StorageImpl};
pub use pipeline::{PhotoPipeline, PipelineRun};
pub use task_manager::{PinTask, PipelineStage, SubTaskError, TaskManager};

type Pipeline = PhotoPipeline<FlickrClient, StorageImpl, MediaDownloaderHandle>;

pub struct Core {
    pipeline: Pipeline,
    task_manager: Arc<TaskManager>,
}

impl Core {
    pub fn new(pipeline: Pipeline) -> Self {
        let task_manager = pipeline.task_manager().clone();
        Self {
            pipeline,
            task_manager,
        }
    }

    fn storage(&self) -> &StorageImpl {
        self.pipeline.storage()
    }

    /// Drops a pin at `coordinate` and starts fetching its photos. A pin that
    /// already exists there gets a new collection instead.
    pub async fn add_pin(&self, coordinate: Coordinate) -> Result<PipelineRun> {
        if let Some(pin) = self.storage().find_pin(coordinate).await? {
            info!("pin {} already at {coordinate}, refreshing it", pin.id);
            return self.pipeline.new_collection(pin).await;
        }
        let pin = self.storage().save_pin(coordinate).await?;
        info!("pin {} added at {coordinate}", pin.id);
        self.pipeline.populate(pin).await
    }

    pub async fn new_collection(&self, pin_id: i64) -> Result<PipelineRun> {
        let pin = self
            .storage()
            .get_pin(pin_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pin {pin_id}")))?;
        self.pipeline.new_collection(pin).await
    }

    pub async fn delete_pin(&self, pin_id: i64) -> Result<bool> {
        self.pipeline.delete_pin(pin_id).await
    }

    pub async fn delete_photo(&self, photo_id: i64) -> Result<bool> {
        self.pipeline.delete_photo(photo_id).await
    }

    pub async fn pins(&self) -> Result<Vec<Pin>> {
        self.storage().get_pins().await
    }

    pub async fn find_pin(&self, coordinate: Coordinate) -> Result<Option<Pin>> {
        self.storage().find_pin(coordinate).await
    }

    pub async fn photos(&self, pin_id: i64) -> Result<Vec<Photo>> {
        self.storage().get_photos(pin_id).await
    }

    /// Cached image of a photo, `None` until it is downloaded.
    pub async fn photo_image(&self, photo_id: i64) -> Result<Option<Bytes>> {
        let Some(photo) = self.storage().get_photo(photo_id).await? else {
            debug!("no photo {photo_id}");
            return Ok(None);
        };
        if !photo.downloaded {
            return Ok(None);
        }
        self.storage().get_photo_image(&photo).await
    }

    pub async fn download_status(&self, pin_id: i64) -> Result<DownloadStatus> {
        self.storage().download_status(pin_id).await
    }

    pub fn pipeline_stage(&self, pin_id: i64) -> Result<Option<PinTask>> {
        self.task_manager.get(pin_id)
    }

    pub fn get_and_clear_sub_task_errors(&self) -> Result<Vec<SubTaskError>> {
        self.task_manager.get_and_clear_sub_task_errors()
    }
}
