use std::future::Future;

use log::{debug, error, info};
use serde::Deserialize;
use serde_json::Value;

use super::FlickrClient;
use crate::error::{Error, Result};
use crate::models::Coordinate;

pub const SEARCH_METHOD: &str = "flickr.photos.search";

mod keys {
    pub const METHOD: &str = "method";
    pub const API_KEY: &str = "api_key";
    pub const FORMAT: &str = "format";
    pub const NO_JSON_CALLBACK: &str = "nojsoncallback";
    pub const PER_PAGE: &str = "per_page";
    pub const LATITUDE: &str = "lat";
    pub const LONGITUDE: &str = "lon";
    pub const EXTRAS: &str = "extras";
    pub const MEDIA: &str = "media";

    pub const PHOTOS: &str = "photos";
    pub const PHOTO: &str = "photo";
}

/// Body Flickr returns with `"stat": "fail"`.
#[derive(Debug, Clone, Deserialize)]
struct ErrResponse {
    stat: String,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub trait PhotoSearchApi {
    /// Raw per-photo objects found near `coordinate`, in server order.
    fn search_photos(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;
}

impl PhotoSearchApi for FlickrClient {
    async fn search_photos(&self, coordinate: Coordinate) -> Result<Vec<Value>> {
        info!("searching photos near {coordinate}");
        let parameters = [
            (keys::METHOD, SEARCH_METHOD.to_string()),
            (keys::API_KEY, self.api_key.clone()),
            (keys::FORMAT, "json".to_string()),
            (keys::NO_JSON_CALLBACK, "1".to_string()),
            (keys::PER_PAGE, self.per_page.to_string()),
            (keys::LATITUDE, coordinate.latitude.to_string()),
            (keys::LONGITUDE, coordinate.longitude.to_string()),
            (keys::EXTRAS, "url_m".to_string()),
            (keys::MEDIA, "photos".to_string()),
        ];
        let response = self.http.get_json(&self.base_url, parameters, None).await?;
        let photos = extract_photos(response)?;
        debug!("got {} photos near {coordinate}", photos.len());
        Ok(photos)
    }
}

/// Descends into `photos.photo` of a search response.
pub fn extract_photos(response: Value) -> Result<Vec<Value>> {
    if let Ok(ErrResponse {
        stat,
        code,
        message,
    }) = ErrResponse::deserialize(&response)
        && stat == "fail"
    {
        error!("photo search failed with api error {code}: {message}");
        return Err(Error::ApiError { code, message });
    }

    let Value::Object(mut root) = response else {
        return Err(malformed("search response is not an object"));
    };
    let Some(Value::Object(mut photos)) = root.remove(keys::PHOTOS) else {
        return Err(malformed("could not parse 'photos' from search response"));
    };
    let Some(Value::Array(photo)) = photos.remove(keys::PHOTO) else {
        return Err(malformed("could not parse 'photo' array from search response"));
    };
    Ok(photo)
}

fn malformed(message: &str) -> Error {
    error!("{message}");
    Error::MalformedSearchResponse(message.to_string())
}
