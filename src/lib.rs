pub mod logging;
pub mod storage;

pub use storage::{Adapter, AdapterSettings, BlobMetadata, BucketError, BucketResult, Expiry};
