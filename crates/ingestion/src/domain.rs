mod query_service;
mod telemetry_service;
mod translator;
mod validator;

pub use query_service::*;
pub use telemetry_service::*;
pub use translator::*;
pub use validator::*;
