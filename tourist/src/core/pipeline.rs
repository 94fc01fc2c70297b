use std::future::Future;
use std::pin::Pin as BoxedPin;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use itertools::Itertools;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use super::task::TaskContext;
use super::task_manager::{PipelineStage, RunHandle, TaskManager};
use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::media_downloader::{AsyncDownloadCallback, MediaDownloader};
use crate::message::PhotoEvent;
use crate::models::{Photo, Pin, SearchPhoto};
use crate::storage::Storage;

const DISPATCH_CONCURRENCY: usize = 8;

/// Outcome of starting a pipeline run: the persisted photos and the events of
/// their downloads. The channel closes once every download has ended.
#[derive(Debug)]
pub struct PipelineRun {
    pub pin: Pin,
    pub photos: Vec<Photo>,
    pub events: mpsc::Receiver<PhotoEvent>,
}

impl PipelineRun {
    /// Collects events until every download of the run has ended.
    pub async fn wait(mut self) -> Vec<PhotoEvent> {
        let mut events = Vec::with_capacity(self.photos.len());
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        events
    }
}

/// Turns a pin into a set of persisted photos whose images are fetched in the
/// background.
#[derive(Debug, Clone)]
pub struct PhotoPipeline<A: ApiClient, S: Storage, D: MediaDownloader> {
    api_client: A,
    storage: S,
    downloader: D,
    task_manager: Arc<TaskManager>,
}

impl<A: ApiClient, S: Storage, D: MediaDownloader> PhotoPipeline<A, S, D> {
    pub fn new(api_client: A, storage: S, downloader: D, task_manager: Arc<TaskManager>) -> Self {
        Self {
            api_client,
            storage,
            downloader,
            task_manager,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn task_manager(&self) -> &Arc<TaskManager> {
        &self.task_manager
    }

    /// First population of a pin that has no photos yet.
    pub async fn populate(&self, pin: Pin) -> Result<PipelineRun> {
        info!("populating pin {} at {}", pin.id, pin.coordinate);
        let handle = self.task_manager.start_task(pin.id)?;
        self.run(pin, handle).await
    }

    /// Replaces every photo of the pin with a fresh search.
    pub async fn new_collection(&self, pin: Pin) -> Result<PipelineRun> {
        info!("new collection for pin {} at {}", pin.id, pin.coordinate);
        let handle = self.task_manager.start_task(pin.id)?;
        let removed = self.storage.delete_photos_of_pin(pin.id).await.map_err(|e| {
            self.record_failure(&handle, &e);
            e
        })?;
        debug!("{removed} photos of pin {} discarded", pin.id);
        self.run(pin, handle).await
    }

    /// Cancels whatever runs for the pin, then deletes it.
    pub async fn delete_pin(&self, pin_id: i64) -> Result<bool> {
        self.task_manager.cancel(pin_id)?;
        Ok(self.storage.delete_pin(pin_id).await?.is_some())
    }

    pub async fn delete_photo(&self, photo_id: i64) -> Result<bool> {
        self.storage.delete_photo(photo_id).await
    }

    async fn run(&self, pin: Pin, handle: RunHandle) -> Result<PipelineRun> {
        let raw = self
            .api_client
            .search_photos(pin.coordinate)
            .await
            .map_err(|e| {
                error!("photo search for pin {} failed: {e}", pin.id);
                self.record_failure(&handle, &e);
                e
            })?;
        if handle.cancel.is_cancelled() {
            info!("run of pin {} cancelled during search", pin.id);
            return Err(Error::Cancelled(pin.id));
        }

        self.task_manager
            .set_stage(&handle, PipelineStage::Populating, raw.len() as u64)?;
        let (entries, errs): (Vec<SearchPhoto>, Vec<Error>) =
            raw.into_iter().map(SearchPhoto::try_from).partition_result();
        for e in &errs {
            warn!("search result for pin {} skipped: {e}", pin.id);
        }
        let photos = self
            .storage
            .save_photos(pin.id, &entries)
            .await
            .map_err(|e| {
                error!("failed to save photos of pin {}: {e}", pin.id);
                self.record_failure(&handle, &e);
                e
            })?;
        // A newer run cancels this one before clearing the pin.
        if handle.cancel.is_cancelled() {
            info!(
                "run of pin {} cancelled while saving, withdrawing {} photos",
                pin.id,
                photos.len()
            );
            for photo in &photos {
                self.storage.delete_photo(photo.id).await?;
            }
            return Err(Error::Cancelled(pin.id));
        }

        self.task_manager
            .set_stage(&handle, PipelineStage::Downloading, photos.len() as u64)?;
        let (sender, events) = mpsc::channel(photos.len().max(1));
        stream::iter(photos.iter())
            .map(Ok)
            .try_for_each_concurrent(DISPATCH_CONCURRENCY, |photo| {
                self.dispatch_download(&handle, photo.clone(), sender.clone())
            })
            .await
            .map_err(|e| {
                self.record_failure(&handle, &e);
                e
            })?;
        info!("{} downloads of pin {} dispatched", photos.len(), pin.id);

        Ok(PipelineRun {
            pin,
            photos,
            events,
        })
    }

    async fn dispatch_download(
        &self,
        handle: &RunHandle,
        photo: Photo,
        events: mpsc::Sender<PhotoEvent>,
    ) -> Result<()> {
        let ctx = Arc::new(TaskContext::new(
            photo.pin_id,
            photo.id,
            handle.cancel.clone(),
            self.task_manager.clone(),
            events,
        ));
        let url = photo.url.clone();
        let storage = self.storage.clone();
        let callback: AsyncDownloadCallback = Box::new(
            move |ctx: Arc<TaskContext>,
                  blob: Bytes|
                  -> BoxedPin<Box<dyn Future<Output = Result<()>> + Send>> {
                Box::pin(async move {
                    if ctx.is_cancelled() {
                        debug!("image of photo {} not saved, run cancelled", photo.id);
                        return Ok(());
                    }
                    if storage.save_photo_image(&photo, blob).await? {
                        ctx.notify(PhotoEvent::Downloaded {
                            pin_id: photo.pin_id,
                            photo_id: photo.id,
                        })
                        .await;
                    }
                    Ok(())
                })
            },
        );
        self.downloader.download_media(ctx, &url, callback).await
    }

    fn record_failure(&self, handle: &RunHandle, err: &Error) {
        if let Err(e) = self.task_manager.fail(handle, err.to_string()) {
            error!("Failed to record failure of pin {}: {e}", handle.pin_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::media_downloader::{MediaDownloaderHandle, create_downloader};
    use crate::mock::api::{photo_entry, photo_url};
    use crate::mock::{MockApi, MockImage, SlowStorage};
    use crate::models::{Coordinate, DownloadStatus};
    use crate::storage::database::create_memory_pool;
    use crate::storage::{FileSystemImageCache, StorageImpl};

    type TestPipeline = PhotoPipeline<MockApi, StorageImpl, MediaDownloaderHandle>;

    async fn setup() -> (TestPipeline, MockApi, TempDir) {
        let temp_dir = tempdir().unwrap();
        let storage = StorageImpl::new(
            create_memory_pool().await.unwrap(),
            FileSystemImageCache::new(temp_dir.path().to_path_buf()),
        );
        let api = MockApi::new();
        let (downloader, worker) = create_downloader(8, api.clone());
        tokio::spawn(worker.run());
        let pipeline = PhotoPipeline::new(
            api.clone(),
            storage,
            downloader,
            Arc::new(TaskManager::new()),
        );
        (pipeline, api, temp_dir)
    }

    fn mock_photos(api: &MockApi, ids: &[&str]) {
        api.add_search_response(Ok(ids.iter().map(|id| photo_entry(id)).collect()));
        for id in ids {
            api.add_image(
                &photo_url(id),
                MockImage::Data(Bytes::from(format!("image {id}"))),
            );
        }
    }

    async fn new_pin(pipeline: &TestPipeline) -> Pin {
        pipeline
            .storage()
            .save_pin(Coordinate::new(45.4215, -75.6972))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_photos_downloaded() {
        let (pipeline, api, temp_dir) = setup().await;
        mock_photos(&api, &["1", "2", "3"]);
        let pin = new_pin(&pipeline).await;

        let run = pipeline.populate(pin.clone()).await.unwrap();
        let ids: Vec<_> = run.photos.iter().map(|p| p.photo_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);

        let events = run.wait().await;
        assert_eq!(events.len(), 3);
        assert!(
            events
                .iter()
                .all(|e| matches!(e, PhotoEvent::Downloaded { .. }))
        );

        let status = pipeline.storage().download_status(pin.id).await.unwrap();
        assert_eq!(
            status,
            DownloadStatus {
                total: 3,
                downloaded: 3
            }
        );
        assert!(status.all_downloaded());
        for photo in pipeline.storage().get_photos(pin.id).await.unwrap() {
            assert!(photo.downloaded);
            let blob = std::fs::read(temp_dir.path().join(&photo.file_name)).unwrap();
            assert_eq!(blob, format!("image {}", photo.photo_id).into_bytes());
        }

        let task = pipeline.task_manager().get(pin.id).unwrap().unwrap();
        assert_eq!(task.stage, PipelineStage::Downloading);
        assert_eq!(task.total, 3);
        assert_eq!(api.searched(), [pin.coordinate]);
    }

    #[tokio::test]
    async fn test_one_failed_download_is_isolated() {
        let (pipeline, api, _temp_dir) = setup().await;
        mock_photos(&api, &["1", "2", "3"]);
        api.add_image(&photo_url("2"), MockImage::Status(500));
        let pin = new_pin(&pipeline).await;

        let events = pipeline.populate(pin.clone()).await.unwrap().wait().await;
        assert_eq!(events.len(), 3);
        let failed: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PhotoEvent::DownloadFailed { .. }))
            .collect();
        assert_eq!(failed.len(), 1);

        let status = pipeline.storage().download_status(pin.id).await.unwrap();
        assert_eq!(status.downloaded, 2);
        assert_eq!(status.total, 3);
        assert!(!status.all_downloaded());

        let photos = pipeline.storage().get_photos(pin.id).await.unwrap();
        let degraded = photos.iter().find(|p| p.photo_id == "2").unwrap();
        assert!(!degraded.downloaded);
        assert!(matches!(
            failed[0],
            PhotoEvent::DownloadFailed { photo_id, .. } if *photo_id == degraded.id
        ));

        let errors = pipeline
            .task_manager()
            .get_and_clear_sub_task_errors()
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].photo_id, degraded.id);
    }

    #[tokio::test]
    async fn test_search_failure() {
        let (pipeline, api, temp_dir) = setup().await;
        api.add_search_response(Err(Error::InvalidStatus(503)));
        let pin = new_pin(&pipeline).await;

        let res = pipeline.populate(pin.clone()).await;
        assert!(matches!(res, Err(Error::InvalidStatus(503))));

        let task = pipeline.task_manager().get(pin.id).unwrap().unwrap();
        assert_eq!(task.stage, PipelineStage::Failed);
        assert!(task.error.is_some());
        assert!(
            pipeline
                .storage()
                .get_photos(pin.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_entries_skipped() {
        let (pipeline, api, _temp_dir) = setup().await;
        api.add_search_response(Ok(vec![
            photo_entry("1"),
            json!({ "id": "2", "title": "no url" }),
            json!("garbage"),
            photo_entry("3"),
        ]));
        for id in ["1", "3"] {
            api.add_image(&photo_url(id), MockImage::Data(Bytes::from_static(b"data")));
        }
        let pin = new_pin(&pipeline).await;

        let run = pipeline.populate(pin.clone()).await.unwrap();
        let ids: Vec<_> = run.photos.iter().map(|p| p.photo_id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(run.wait().await.len(), 2);
        assert!(
            pipeline
                .storage()
                .download_status(pin.id)
                .await
                .unwrap()
                .all_downloaded()
        );
    }

    #[tokio::test]
    async fn test_empty_search_result() {
        let (pipeline, api, _temp_dir) = setup().await;
        api.add_search_response(Ok(Vec::new()));
        let pin = new_pin(&pipeline).await;

        let run = pipeline.populate(pin.clone()).await.unwrap();
        assert!(run.photos.is_empty());
        assert!(run.wait().await.is_empty());
        let status = pipeline.storage().download_status(pin.id).await.unwrap();
        assert_eq!(status, DownloadStatus::default());
        assert!(status.all_downloaded());
    }

    #[tokio::test]
    async fn test_new_collection_replaces_photos() {
        let (pipeline, api, temp_dir) = setup().await;
        mock_photos(&api, &["1", "2"]);
        mock_photos(&api, &["7", "8", "9"]);
        let pin = new_pin(&pipeline).await;

        let first = pipeline.populate(pin.clone()).await.unwrap();
        let old_files: Vec<_> = first.photos.iter().map(|p| p.file_name.clone()).collect();
        first.wait().await;
        for file in &old_files {
            assert!(temp_dir.path().join(file).exists());
        }

        let second = pipeline.new_collection(pin.clone()).await.unwrap();
        second.wait().await;

        let photos = pipeline.storage().get_photos(pin.id).await.unwrap();
        let ids: Vec<_> = photos.iter().map(|p| p.photo_id.as_str()).collect();
        assert_eq!(ids, ["7", "8", "9"]);
        assert!(photos.iter().all(|p| p.downloaded));
        for file in &old_files {
            assert!(!temp_dir.path().join(file).exists());
        }
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 3);
    }

    #[tokio::test]
    async fn test_run_superseded_while_saving_withdraws_its_photos() {
        let temp_dir = tempdir().unwrap();
        let storage = SlowStorage::new(
            StorageImpl::new(
                create_memory_pool().await.unwrap(),
                FileSystemImageCache::new(temp_dir.path().to_path_buf()),
            ),
            Duration::from_millis(300),
        );
        let api = MockApi::new();
        mock_photos(&api, &["1", "2"]);
        mock_photos(&api, &["5"]);
        let (downloader, worker) = create_downloader(8, api.clone());
        tokio::spawn(worker.run());
        let pipeline = PhotoPipeline::new(
            api.clone(),
            storage,
            downloader,
            Arc::new(TaskManager::new()),
        );
        let pin = pipeline
            .storage()
            .save_pin(Coordinate::new(45.4215, -75.6972))
            .await
            .unwrap();

        // the second run starts while the first one is still saving
        let (first, second) = tokio::join!(pipeline.populate(pin), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            pipeline.new_collection(pin).await
        });
        assert!(matches!(first, Err(Error::Cancelled(id)) if id == pin.id));
        let events = second.unwrap().wait().await;
        assert_eq!(events.len(), 1);

        let photos = pipeline.storage().get_photos(pin.id).await.unwrap();
        let ids: Vec<_> = photos.iter().map(|p| p.photo_id.as_str()).collect();
        assert_eq!(ids, ["5"]);
        assert!(photos[0].downloaded);
        let status = pipeline.storage().download_status(pin.id).await.unwrap();
        assert_eq!(
            status,
            DownloadStatus {
                total: 1,
                downloaded: 1
            }
        );
        assert!(status.all_downloaded());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_persists_nothing() {
        let (pipeline, api, temp_dir) = setup().await;
        api.add_search_response(Ok(vec![photo_entry("1"), photo_entry("2")]));
        api.add_image(&photo_url("1"), MockImage::Pending);
        api.add_image(&photo_url("2"), MockImage::Pending);
        mock_photos(&api, &["5"]);
        let pin = new_pin(&pipeline).await;

        let first = pipeline.populate(pin.clone()).await.unwrap();
        assert_eq!(first.photos.len(), 2);

        // starting over cancels the downloads still in flight
        let second = pipeline.new_collection(pin.clone()).await.unwrap();
        let first_events = tokio::time::timeout(Duration::from_secs(5), first.wait())
            .await
            .unwrap();
        assert!(first_events.is_empty());

        let events = second.wait().await;
        assert_eq!(events.len(), 1);
        let photos = pipeline.storage().get_photos(pin.id).await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].photo_id, "5");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
        assert!(
            pipeline
                .task_manager()
                .get_and_clear_sub_task_errors()
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_delete_pin_cancels_and_cascades() {
        let (pipeline, api, temp_dir) = setup().await;
        mock_photos(&api, &["1", "2"]);
        api.add_search_response(Ok(vec![photo_entry("3")]));
        api.add_image(&photo_url("3"), MockImage::Pending);
        let pin = new_pin(&pipeline).await;
        let other = pipeline
            .storage()
            .save_pin(Coordinate::new(1.0, 2.0))
            .await
            .unwrap();

        pipeline.populate(pin.clone()).await.unwrap().wait().await;
        let pending = pipeline.populate(other.clone()).await.unwrap();
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);

        assert!(pipeline.delete_pin(pin.id).await.unwrap());
        assert!(pipeline.storage().get_pin(pin.id).await.unwrap().is_none());
        assert!(
            pipeline
                .storage()
                .get_photos(pin.id)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
        assert!(!pipeline.delete_pin(pin.id).await.unwrap());

        assert!(pipeline.delete_pin(other.id).await.unwrap());
        let events = tokio::time::timeout(Duration::from_secs(5), pending.wait())
            .await
            .unwrap();
        assert!(events.is_empty());
        assert!(pipeline.task_manager().get(other.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_photo() {
        let (pipeline, api, temp_dir) = setup().await;
        mock_photos(&api, &["1", "2"]);
        let pin = new_pin(&pipeline).await;

        let run = pipeline.populate(pin.clone()).await.unwrap();
        let target = run.photos[0].clone();
        run.wait().await;

        assert!(pipeline.delete_photo(target.id).await.unwrap());
        assert!(!temp_dir.path().join(&target.file_name).exists());
        assert!(!pipeline.delete_photo(target.id).await.unwrap());
        let status = pipeline.storage().download_status(pin.id).await.unwrap();
        assert_eq!(
            status,
            DownloadStatus {
                total: 1,
                downloaded: 1
            }
        );
    }
}
