mod publish_logging;
mod publish_tracing;
mod publisher;
mod retry;
mod timeout;
mod types;

pub use publish_logging::*;
pub use publish_tracing::*;
pub use publisher::*;
pub use retry::*;
pub use timeout::*;
pub use types::*;
