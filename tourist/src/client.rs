pub mod json;
pub mod request;
pub mod validator;

use std::collections::HashMap;
use std::fmt::Display;

use bytes::Bytes;
use log::{debug, error};
use reqwest::{Client, Method};
use serde_json::Value;

use crate::error::Result;
pub use json::parse_json;
pub use request::{RequestDescriptor, build_request, escaped_parameters};
pub use validator::validate_response;

/// One shared HTTP session. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    /// Sends the request and returns the validated payload.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<Bytes> {
        let RequestDescriptor {
            method,
            url,
            headers,
        } = request;
        debug!("{method} {url}");
        let response = self
            .client
            .request(method, url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                error!("There was an error with request to {url}: {e}");
                e
            })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            error!("Failed to read bytes from response for {url}: {e}");
            e
        })?;
        validate_response(Some(status), Some(&body[..])).map_err(|e| {
            error!("Request to {url} failed validation: {e}");
            e
        })?;
        Ok(body)
    }

    pub async fn get<I, K, V>(
        &self,
        url: &str,
        parameters: I,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<Bytes>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        let request = build_request(url, "", Method::GET, parameters, headers)?;
        self.execute(request).await
    }

    pub async fn get_json<I, K, V>(
        &self,
        url: &str,
        parameters: I,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        let body = self.get(url, parameters, headers).await?;
        parse_json(&body)
    }
}
