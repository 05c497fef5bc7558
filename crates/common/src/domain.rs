mod backlog;
mod batch;
mod result;
mod sensor_type;
mod sensor_value;
mod telemetry;

pub use backlog::*;
pub use batch::*;
pub use result::*;
pub use sensor_type::*;
pub use sensor_value::*;
pub use telemetry::*;
