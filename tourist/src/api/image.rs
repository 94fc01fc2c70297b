use std::future::Future;

use bytes::Bytes;
use log::debug;
use url::Url;

use super::FlickrClient;
use crate::error::Result;

pub trait ImageApi {
    /// Fetches the raw bytes behind `url`.
    fn download_image(&self, url: &Url) -> impl Future<Output = Result<Bytes>> + Send;
}

impl ImageApi for FlickrClient {
    async fn download_image(&self, url: &Url) -> Result<Bytes> {
        let params: [(&str, &str); 0] = [];
        let body = self.http.get(url.as_str(), params, None).await?;
        debug!("downloaded {} bytes from {url}", body.len());
        Ok(body)
    }
}
