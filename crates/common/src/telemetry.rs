mod config;
mod init;
mod pipeline_metrics;

pub use config::*;
pub use init::*;
pub use pipeline_metrics::*;
