use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum PipelineStage {
    Searching,
    Populating,
    Downloading,
    Failed,
}

/// Pipeline state of one pin.
#[derive(Debug, Clone, Serialize)]
pub struct PinTask {
    pub pin_id: i64,
    pub stage: PipelineStage,
    pub total: u64,
    pub error: Option<String>,
}

/// Identifies one pipeline run. Runs superseded by a newer one on the same pin
/// are cancelled and can no longer change the pin's state.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub pin_id: i64,
    run: u64,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub enum SubTaskErrorType {
    DownloadMedia(String), // URL
}

#[derive(Debug, Clone, Serialize)]
pub struct SubTaskError {
    pub pin_id: i64,
    pub photo_id: i64,
    pub error_type: SubTaskErrorType,
    pub message: String,
}

#[derive(Debug)]
struct Entry {
    task: PinTask,
    run: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
    next_run: u64,
    tasks: HashMap<i64, Entry>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskManager {
    inner: Arc<Mutex<Inner>>,
    sub_task_errors: Arc<Mutex<Vec<SubTaskError>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Default::default()
    }

    /// Begins a new run for `pin_id` in the searching stage, cancelling the
    /// run it replaces.
    pub fn start_task(&self, pin_id: i64) -> Result<RunHandle> {
        let mut inner = self.inner.lock()?;
        inner.next_run += 1;
        let run = inner.next_run;
        let cancel = CancellationToken::new();
        let entry = Entry {
            task: PinTask {
                pin_id,
                stage: PipelineStage::Searching,
                total: 0,
                error: None,
            },
            run,
            cancel: cancel.clone(),
        };
        if let Some(previous) = inner.tasks.insert(pin_id, entry) {
            debug!("run {} of pin {pin_id} superseded by run {run}", previous.run);
            previous.cancel.cancel();
        }
        Ok(RunHandle {
            pin_id,
            run,
            cancel,
        })
    }

    fn with_current<F>(&self, handle: &RunHandle, f: F) -> Result<()>
    where
        F: FnOnce(&mut PinTask),
    {
        let mut inner = self.inner.lock()?;
        match inner.tasks.get_mut(&handle.pin_id) {
            Some(entry) if entry.run == handle.run => {
                f(&mut entry.task);
                Ok(())
            }
            Some(_) => {
                debug!(
                    "run {} of pin {} is stale, state left unchanged",
                    handle.run, handle.pin_id
                );
                Ok(())
            }
            None if handle.cancel.is_cancelled() => Ok(()),
            None => Err(Error::InconsistentTask(format!(
                "no task recorded for pin {}",
                handle.pin_id
            ))),
        }
    }

    pub fn set_stage(&self, handle: &RunHandle, stage: PipelineStage, total: u64) -> Result<()> {
        self.with_current(handle, |task| {
            task.stage = stage;
            task.total = total;
        })
    }

    pub fn fail(&self, handle: &RunHandle, error: String) -> Result<()> {
        self.with_current(handle, |task| {
            task.stage = PipelineStage::Failed;
            task.error = Some(error);
        })
    }

    /// Cancels the run of `pin_id` and forgets its state. Returns whether
    /// there was one.
    pub fn cancel(&self, pin_id: i64) -> Result<bool> {
        let entry = self.inner.lock()?.tasks.remove(&pin_id);
        Ok(entry
            .map(|entry| {
                entry.cancel.cancel();
                debug!("run {} of pin {pin_id} cancelled", entry.run);
            })
            .is_some())
    }

    pub fn get(&self, pin_id: i64) -> Result<Option<PinTask>> {
        Ok(self
            .inner
            .lock()?
            .tasks
            .get(&pin_id)
            .map(|entry| entry.task.clone()))
    }

    pub fn add_sub_task_error(&self, error: SubTaskError) -> Result<()> {
        self.sub_task_errors.lock()?.push(error);
        Ok(())
    }

    pub fn get_and_clear_sub_task_errors(&self) -> Result<Vec<SubTaskError>> {
        let mut errors = self.sub_task_errors.lock()?;
        let ret = errors.drain(..).collect();
        Ok(ret)
    }
}
