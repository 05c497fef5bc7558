use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use super::types::{NatsPublishError, PublishRequest, PublishResponse};
use super::{
    NatsPublishRetryLayer, NatsPublishTimeoutLayer, PublishLogLayer, PublishSpanConfig,
    PublishSpanLayer, RetryPolicy,
};
use crate::nats::JetStreamPublisher;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

/// Publisher stack handed to producers
pub type LayeredPublisher = BoxCloneSyncService<PublishRequest, PublishResponse, NatsPublishError>;

/// Inner service that performs the actual NATS publish
#[derive(Clone)]
pub struct NatsPublishService {
    publisher: Arc<dyn JetStreamPublisher>,
}

impl NatsPublishService {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self { publisher }
    }
}

impl Service<PublishRequest> for NatsPublishService {
    type Response = PublishResponse;
    type Error = NatsPublishError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        let publisher = Arc::clone(&self.publisher);

        Box::pin(async move {
            let ack = publisher
                .publish_with_headers(req.subject.clone(), req.headers, req.payload)
                .await?;
            Ok(PublishResponse {
                subject: req.subject,
                ack,
            })
        })
    }
}

/// Builder for the layered NATS publisher
pub struct NatsPublisherBuilder {
    publisher: Arc<dyn JetStreamPublisher>,
    tracing_config: Option<PublishSpanConfig>,
    with_logging: bool,
    timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl NatsPublisherBuilder {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self {
            publisher,
            tracing_config: None,
            with_logging: false,
            timeout: None,
            retry_policy: None,
        }
    }

    pub fn with_tracing(mut self, config: PublishSpanConfig) -> Self {
        self.tracing_config = Some(config);
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.with_logging = true;
        self
    }

    /// Upper bound on a publish including every retry
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the layered publisher service
    /// Layer order (outermost first): Tracing -> Logging -> Timeout -> Retry -> Publish
    pub fn build(self) -> LayeredPublisher {
        let mut svc = LayeredPublisher::new(NatsPublishService::new(self.publisher));

        if let Some(policy) = self.retry_policy {
            svc = LayeredPublisher::new(NatsPublishRetryLayer::new(policy).layer(svc));
        }
        if let Some(timeout) = self.timeout {
            svc = LayeredPublisher::new(NatsPublishTimeoutLayer::new(timeout).layer(svc));
        }
        if self.with_logging {
            svc = LayeredPublisher::new(PublishLogLayer.layer(svc));
        }
        if let Some(config) = self.tracing_config {
            svc = LayeredPublisher::new(PublishSpanLayer::new(config).layer(svc));
        }

        svc
    }
}
