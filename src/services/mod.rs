pub mod drive;
pub mod formatter;
pub mod pipeline;
pub mod staging;

pub use drive::{DriveDiagnostics, StorageClient, UploadError, UploadResult};
