use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::task_manager::TaskManager;
use crate::message::PhotoEvent;

/// What a single photo download carries through the downloader.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub pin_id: i64,
    pub photo_id: i64,
    pub cancel: CancellationToken,
    pub task_manager: Arc<TaskManager>,
    events: mpsc::Sender<PhotoEvent>,
}

impl TaskContext {
    pub fn new(
        pin_id: i64,
        photo_id: i64,
        cancel: CancellationToken,
        task_manager: Arc<TaskManager>,
        events: mpsc::Sender<PhotoEvent>,
    ) -> Self {
        Self {
            pin_id,
            photo_id,
            cancel,
            task_manager,
            events,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Delivers `event` to whoever holds the receiving side. A receiver that
    /// was already dropped is not an error.
    pub async fn notify(&self, event: PhotoEvent) {
        if self.events.send(event).await.is_err() {
            debug!(
                "nobody listens to events of pin {}, photo {} event dropped",
                self.pin_id, self.photo_id
            );
        }
    }
}
