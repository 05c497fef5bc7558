pub mod domain;
pub mod http;
pub mod ingestion_api;
pub mod nats;
pub mod registry;

pub use domain::*;
pub use http::*;
pub use ingestion_api::*;
pub use nats::*;
pub use registry::*;
