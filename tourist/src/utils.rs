use url::Url;

use crate::error::{Error, Result};

pub fn url_to_filename(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| {
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .ok_or_else(|| Error::FormatError(format!("no filename in url: {url}")))
}

/// Name of the cached file for a photo.
///
/// Flickr names its files `<id>_<secret>_<size>.jpg`, so the last path segment
/// is kept as is when it already starts with the photo id. Otherwise the id is
/// prefixed to keep photos with equal trailing segments apart.
///
/// Names are unique only while ids contain no `_`, which holds for Flickr's
/// numeric ids: `"1"` with `2_a.jpg` and `"1_2"` with `a.jpg` both give
/// `1_2_a.jpg`. Storage never deletes a file another record still names, so
/// such a clash shares an image but loses none.
pub fn cache_file_name(photo_id: &str, url: &Url) -> Result<String> {
    let name = url_to_filename(url)?;
    let prefix = format!("{photo_id}_");
    if photo_id.is_empty() || name.starts_with(&prefix) {
        Ok(name)
    } else {
        Ok(prefix + &name)
    }
}
