pub mod photo;
pub mod pin;

pub use photo::{DownloadStatus, Photo, SearchPhoto};
pub use pin::{Coordinate, Pin};
