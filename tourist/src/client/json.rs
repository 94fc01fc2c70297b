use bytes::Bytes;
use log::error;
use serde_json::Value;

use crate::error::{Error, Result};

/// Parses a raw payload into a generic JSON value.
pub fn parse_json(payload: &[u8]) -> Result<Value> {
    serde_json::from_slice(payload).map_err(|source| {
        error!(
            "Could not parse the data as JSON: {source}, payload: {}",
            String::from_utf8_lossy(payload)
        );
        Error::Decode {
            source,
            payload: Bytes::copy_from_slice(payload),
        }
    })
}
