use serde::Serialize;

/// Progress of one pipeline invocation, delivered on its own channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PhotoEvent {
    Downloaded {
        pin_id: i64,
        photo_id: i64,
    },
    DownloadFailed {
        pin_id: i64,
        photo_id: i64,
        url: String,
        error: String,
    },
}
