use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::Result;

/// One entry of a photo search result, decoded from the raw JSON object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchPhoto {
    pub id: String,
    pub url_m: Url,
}

impl TryFrom<Value> for SearchPhoto {
    type Error = crate::error::Error;

    fn try_from(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub id: i64,
    pub pin_id: i64,
    /// Identifier assigned by the photo API.
    pub photo_id: String,
    pub url: Url,
    /// Name of the cached image file, derived from `url`.
    pub file_name: String,
    pub downloaded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStatus {
    pub total: u64,
    pub downloaded: u64,
}

impl DownloadStatus {
    pub fn all_downloaded(&self) -> bool {
        self.downloaded == self.total
    }
}
