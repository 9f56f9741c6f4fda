//! Request pipeline: endpoint, credential, retry and normalization composed

pub mod request;
pub mod service;

pub use request::{ApiRequest, ApiResponse};
pub use service::RequestPipeline;
