use std::sync::Arc;

use log::{info, warn};

use crate::{
    api::FlickrClient,
    client::HttpClient,
    config::{Config, get_config},
    core::{Core, PhotoPipeline, TaskManager},
    error::{Context, Result},
    media_downloader::create_downloader,
    storage::{FileSystemImageCache, StorageImpl, database},
};

/// Wires the HTTP client, record store, image cache and downloader into a
/// [`Core`]. Must be built inside a tokio runtime, which runs the downloader.
#[derive(Debug, Default)]
pub struct CoreBuilder {
    config: Option<Config>,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Uses `config` instead of the global configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub async fn build(self) -> Result<Arc<Core>> {
        info!("CoreBuilder: Building Core service...");
        let config = match self.config {
            Some(config) => config,
            None => get_config().read()?.clone(),
        };
        if config.api_key.is_empty() {
            warn!("No API key configured, photo searches will be rejected");
        }

        let db_pool = database::create_db_pool(&config.db_path).await?;
        let storage = StorageImpl::new(db_pool, FileSystemImageCache::new(config.picture_path));
        info!("Storage initialized");

        let http_client = HttpClient::new().context("creating the HTTP client")?;
        let api_client = FlickrClient::new(
            http_client,
            config.search_url,
            config.api_key,
            config.photos_per_page,
        );
        info!("ApiClient initialized");

        let (handle, worker) = create_downloader(config.downloader_buffer, api_client.clone());
        tokio::spawn(worker.run());
        info!("MediaDownloader initialized and worker spawned");

        let task_manager = Arc::new(TaskManager::new());
        let pipeline = PhotoPipeline::new(api_client, storage, handle, task_manager);
        let core = Arc::new(Core::new(pipeline));
        info!("Core service built successfully.");
        Ok(core)
    }
}
