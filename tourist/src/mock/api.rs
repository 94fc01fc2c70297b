//! Test mock for the photo API
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::{Value, json};
use url::Url;

use crate::api::{ApiClient, ImageApi, PhotoSearchApi};
use crate::error::{Error, Result};
use crate::models::Coordinate;

#[derive(Debug, Clone)]
pub enum MockImage {
    Data(Bytes),
    Status(u16),
    /// Never completes.
    Pending,
}

#[derive(Debug, Clone, Default)]
pub struct MockApi {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    searches: VecDeque<Result<Vec<Value>>>,
    images: HashMap<String, MockImage>,
    searched: Vec<Coordinate>,
}

impl MockApi {
    pub fn new() -> Self {
        Default::default()
    }

    /// Queues the outcome of the next search.
    pub fn add_search_response(&self, response: Result<Vec<Value>>) {
        self.inner.lock().unwrap().searches.push_back(response);
    }

    pub fn add_image(&self, url: &str, image: MockImage) {
        self.inner
            .lock()
            .unwrap()
            .images
            .insert(url.to_string(), image);
    }

    pub fn searched(&self) -> Vec<Coordinate> {
        self.inner.lock().unwrap().searched.clone()
    }
}

/// A search entry the way the photo API returns it.
pub fn photo_entry(id: &str) -> Value {
    json!({
        "id": id,
        "owner": "12345@N00",
        "title": format!("photo {id}"),
        "url_m": photo_url(id),
    })
}

pub fn photo_url(id: &str) -> String {
    format!("https://live.staticflickr.com/65535/{id}_secret_m.jpg")
}

impl PhotoSearchApi for MockApi {
    async fn search_photos(&self, coordinate: Coordinate) -> Result<Vec<Value>> {
        let mut inner = self.inner.lock().unwrap();
        inner.searched.push(coordinate);
        inner
            .searches
            .pop_front()
            .unwrap_or_else(|| Err(Error::Other(format!("search at {coordinate} not mocked"))))
    }
}

impl ImageApi for MockApi {
    async fn download_image(&self, url: &Url) -> Result<Bytes> {
        let image = self.inner.lock().unwrap().images.get(url.as_str()).cloned();
        match image {
            Some(MockImage::Data(data)) => Ok(data),
            Some(MockImage::Status(code)) => Err(Error::InvalidStatus(code)),
            Some(MockImage::Pending) => std::future::pending().await,
            None => Err(Error::Other(format!("URL not mocked: {url}"))),
        }
    }
}

impl ApiClient for MockApi {}
