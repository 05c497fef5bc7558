mod schedule;
mod scheduler;
mod single_flight;

pub use schedule::*;
pub use scheduler::*;
pub use single_flight::*;
