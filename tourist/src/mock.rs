pub mod api;
pub mod storage;

pub use api::{MockApi, MockImage};
pub use storage::SlowStorage;
