//! Client for the external text classification service.

pub mod client;
pub mod error;
pub mod limiter;
pub mod prompt;
pub mod response;
pub mod service;

pub use client::ClassifierClient;
pub use error::{ClassifyError, ServiceError};
pub use limiter::ConcurrencyLimiter;
pub use response::ServiceReply;
pub use service::{ClassificationService, OpenAiService};
