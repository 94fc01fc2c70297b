use std::collections::HashMap;
use std::fmt::Display;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::{Url, form_urlencoded};

use crate::error::{Error, Result};

/// Everything needed to issue one HTTP request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

/// Encodes a flat parameter mapping into a query string without the leading `?`.
pub fn encode_query<I, K, V>(parameters: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in parameters {
        serializer.append_pair(key.as_ref(), &value.to_string());
    }
    serializer.finish()
}

/// Returns `?k=v&...`, or an empty string when there are no parameters.
pub fn escaped_parameters<I, K, V>(parameters: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let query = encode_query(parameters);
    if query.is_empty() {
        query
    } else {
        format!("?{query}")
    }
}

pub fn build_headers(headers: Option<&HashMap<String, String>>) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();
    for (field, value) in headers.into_iter().flatten() {
        let name = HeaderName::from_bytes(field.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{field}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("{field}: {e}")))?;
        header_map.append(name, value);
    }
    Ok(header_map)
}

/// Builds a request for `base_url` + `path`, appending the escaped parameters
/// to whatever query the base already carries.
pub fn build_request<I, K, V>(
    base_url: &str,
    path: &str,
    method: Method,
    parameters: I,
    headers: Option<&HashMap<String, String>>,
) -> Result<RequestDescriptor>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let mut url = Url::parse(&format!("{base_url}{path}"))?;
    let query = encode_query(parameters);
    if !query.is_empty() {
        let merged = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
            _ => query,
        };
        url.set_query(Some(&merged));
    }
    Ok(RequestDescriptor {
        method,
        url,
        headers: build_headers(headers)?,
    })
}
