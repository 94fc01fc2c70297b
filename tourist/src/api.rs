pub mod image;
pub mod photos_search;

use crate::client::HttpClient;

pub use image::ImageApi;
pub use photos_search::PhotoSearchApi;

pub trait ApiClient:
    photos_search::PhotoSearchApi + image::ImageApi + Send + Sync + Clone + 'static
{
}

/// Client for the Flickr REST API.
#[derive(Debug, Clone)]
pub struct FlickrClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    per_page: u32,
}

impl FlickrClient {
    pub fn new(http: HttpClient, base_url: String, api_key: String, per_page: u32) -> Self {
        Self {
            http,
            base_url,
            api_key,
            per_page,
        }
    }
}

impl ApiClient for FlickrClient {}
