pub mod backlog_worker;
pub mod domain;

pub use backlog_worker::*;
pub use domain::*;
