mod analytics_event_producer;

pub use analytics_event_producer::*;
