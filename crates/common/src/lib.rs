pub mod domain;
pub mod memory;
pub mod nats;
pub mod postgres;
pub mod telemetry;
pub mod validation;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockAnalyticsEventProducer;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockBacklogRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceHeartbeat;
#[cfg(any(test, feature = "testing"))]
pub use nats::MockJetStreamPublisher;
