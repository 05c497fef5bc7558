mod error;
mod handlers;
mod request_logging;
mod responses;
mod router;

pub use error::*;
pub use handlers::*;
pub use request_logging::*;
pub use responses::*;
pub use router::*;
