use log::error;

use crate::error::{Error, Result};

/// Checks a transport response for a 2XX status and a payload.
///
/// A zero-length payload still counts as present.
pub fn validate_response(status: Option<u16>, payload: Option<&[u8]>) -> Result<()> {
    let Some(status) = status else {
        error!("Request returned an invalid response (no status code)");
        return Err(Error::InvalidResponse);
    };
    if !(200..=299).contains(&status) {
        return Err(Error::InvalidStatus(status));
    }
    if payload.is_none() {
        return Err(Error::NoData);
    }
    Ok(())
}
