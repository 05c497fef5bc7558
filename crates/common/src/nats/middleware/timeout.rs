use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use super::types::{take_ready, NatsPublishError, PublishRequest, PublishResponse};
use tower::{Layer, Service};

/// Bounds the whole publish, retries included, to a fixed duration
#[derive(Clone, Debug)]
pub struct NatsPublishTimeoutLayer {
    timeout: Duration,
}

impl NatsPublishTimeoutLayer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl<S> Layer<S> for NatsPublishTimeoutLayer {
    type Service = NatsPublishTimeoutService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsPublishTimeoutService {
            inner: service,
            timeout: self.timeout,
        }
    }
}

#[derive(Clone)]
pub struct NatsPublishTimeoutService<S> {
    inner: S,
    timeout: Duration,
}

impl<S> Service<PublishRequest> for NatsPublishTimeoutService<S>
where
    S: Service<PublishRequest, Response = PublishResponse, Error = NatsPublishError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = PublishResponse;
    type Error = NatsPublishError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        let subject = req.subject.clone();
        let timeout = self.timeout;
        let mut inner = take_ready(&mut self.inner);

        Box::pin(async move {
            match tokio::time::timeout(timeout, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => Err(NatsPublishError::Timeout { subject, timeout }),
            }
        })
    }
}
