#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod records;
pub mod remote;

pub use config::{ApiConfig, ConfigError};
pub use error::ApiError;
pub use http::HttpApi;
pub use memory::{Call, Endpoint, InMemoryBackend};
pub use remote::{CertificateApi, EnrollmentApi, LessonApi, ProgressApi, Remote};
