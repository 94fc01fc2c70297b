use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, info};
use tokio::sync::mpsc;
use url::Url;

use crate::api::ImageApi;
use crate::core::task::TaskContext;
use crate::core::task_manager::{SubTaskError, SubTaskErrorType};
use crate::error::Result;
use crate::message::PhotoEvent;

pub trait MediaDownloader: Clone + Send + Sync + 'static {
    fn download_media(
        &self,
        ctx: Arc<TaskContext>,
        url: &Url,
        callback: AsyncDownloadCallback,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Runs after a successful download, with the downloaded bytes.
pub type AsyncDownloadCallback = Box<
    dyn FnOnce(
            Arc<TaskContext>,
            Bytes,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>
        + Send
        + 'static,
>;

struct DownloadTask {
    ctx: Arc<TaskContext>,
    url: Url,
    callback: AsyncDownloadCallback,
}

/// Receives download requests and runs each one on its own tokio task.
#[must_use = "The worker must be spawned to process download requests"]
pub struct DownloaderWorker<F: ImageApi> {
    receiver: mpsc::Receiver<DownloadTask>,
    fetcher: F,
}

#[derive(Debug, Clone)]
pub struct MediaDownloaderHandle {
    sender: mpsc::Sender<DownloadTask>,
}

/// Creates the handle used to queue downloads and the worker serving it.
/// The worker has to be spawned.
pub fn create_downloader<F: ImageApi>(
    buffer: usize,
    fetcher: F,
) -> (MediaDownloaderHandle, DownloaderWorker<F>) {
    let (sender, receiver) = mpsc::channel(buffer);
    let handle = MediaDownloaderHandle { sender };
    let worker = DownloaderWorker { receiver, fetcher };
    (handle, worker)
}

impl MediaDownloader for MediaDownloaderHandle {
    /// Queues `url` for download and returns once the worker accepted it.
    /// The callback runs only when the download succeeds and the run was not
    /// cancelled in the meantime.
    async fn download_media(
        &self,
        ctx: Arc<TaskContext>,
        url: &Url,
        callback: AsyncDownloadCallback,
    ) -> Result<()> {
        let task = DownloadTask {
            ctx,
            url: url.to_owned(),
            callback,
        };
        Ok(self.sender.send(task).await.map_err(|e| {
            error!("Failed to send download task to worker: {e}");
            e
        })?)
    }
}

impl<F> DownloaderWorker<F>
where
    F: ImageApi + Clone + Send + Sync + 'static,
{
    /// Serves requests until every handle is dropped.
    pub async fn run(mut self) {
        info!("Media downloader actor started.");
        while let Some(task) = self.receiver.recv().await {
            tokio::spawn(process_task(self.fetcher.clone(), task));
        }
        info!("Media downloader actor finished.");
    }
}

async fn process_task<F: ImageApi>(fetcher: F, task: DownloadTask) {
    let DownloadTask { ctx, url, callback } = task;
    if ctx.is_cancelled() {
        debug!("download of {url} skipped, run cancelled");
        return;
    }

    debug!("Downloading media from {url}");
    let body = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            debug!("download of {url} abandoned, run cancelled");
            return;
        }
        res = fetcher.download_image(&url) => res,
    };

    let res = match body {
        Ok(body) if ctx.is_cancelled() => {
            debug!("{} bytes from {url} discarded, run cancelled", body.len());
            return;
        }
        Ok(body) => (callback)(ctx.clone(), body).await,
        Err(e) => Err(e),
    };
    if let Err(err) = res {
        report_failure(&ctx, &url, err.to_string()).await;
    }
}

async fn report_failure(ctx: &TaskContext, url: &Url, message: String) {
    error!(
        "Failed to download photo {} of pin {} from {url}: {message}",
        ctx.photo_id, ctx.pin_id
    );
    let sub_task_err = SubTaskError {
        pin_id: ctx.pin_id,
        photo_id: ctx.photo_id,
        error_type: SubTaskErrorType::DownloadMedia(url.to_string()),
        message: message.clone(),
    };
    if let Err(e) = ctx.task_manager.add_sub_task_error(sub_task_err) {
        error!("Failed to add sub-task error: {e}");
    }
    ctx.notify(PhotoEvent::DownloadFailed {
        pin_id: ctx.pin_id,
        photo_id: ctx.photo_id,
        url: url.to_string(),
        error: message,
    })
    .await;
}
