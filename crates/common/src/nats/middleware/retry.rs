use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use super::types::{NatsPublishError, PublishRequest, PublishResponse};
use tower::{Layer, Service, ServiceExt};
use tracing::warn;

/// Retry schedule for failed publishes.
///
/// Requests are resent unchanged, `Nats-Msg-Id` included, so a retry of a
/// write that did land is dropped by the stream instead of stored twice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each one after
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[derive(Clone, Debug)]
pub struct NatsPublishRetryLayer {
    policy: RetryPolicy,
}

impl NatsPublishRetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for NatsPublishRetryLayer {
    type Service = NatsPublishRetryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        NatsPublishRetryService {
            inner: service,
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NatsPublishRetryService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Service<PublishRequest> for NatsPublishRetryService<S>
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
        let inner = self.inner.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let attempts = policy.max_retries + 1;
            let mut attempt = 0;

            loop {
                attempt += 1;
                let result = inner.clone().oneshot(req.clone()).await;

                match result {
                    Ok(response) => return Ok(response),
                    Err(NatsPublishError::Failed(source)) if attempt >= attempts => {
                        return Err(NatsPublishError::Exhausted {
                            subject: req.subject,
                            attempts: attempt,
                            source,
                        });
                    }
                    Err(NatsPublishError::Failed(source)) => {
                        let delay = policy.backoff(attempt - 1);
                        warn!(
                            subject = %req.subject,
                            attempt,
                            max_attempts = attempts,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %source,
                            "publish attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(other) => return Err(other),
                }
            }
        })
    }
}
