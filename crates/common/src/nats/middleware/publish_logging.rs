use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use super::types::{take_ready, PublishRequest, PublishResponse};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

/// One log line per publish outcome. Broker-side duplicates log at warn since
/// they mean a message id was reused.
#[derive(Clone, Copy, Debug, Default)]
pub struct PublishLogLayer;

impl<S> Layer<S> for PublishLogLayer {
    type Service = PublishLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PublishLogService { inner }
    }
}

#[derive(Clone)]
pub struct PublishLogService<S> {
    inner: S,
}

impl<S> Service<PublishRequest> for PublishLogService<S>
where
    S: Service<PublishRequest, Response = PublishResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = PublishResponse;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<PublishResponse, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        let subject = req.subject.clone();
        let message_id = req.message_id().map(str::to_owned);
        let bytes = req.payload.len();
        let started = Instant::now();
        let fut = take_ready(&mut self.inner).call(req);

        Box::pin(async move {
            let result = fut.await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let message_id = message_id.as_deref().unwrap_or("-");

            match &result {
                Ok(response) if response.ack.duplicate => warn!(
                    %subject, %message_id, stream_sequence = response.ack.sequence, elapsed_ms,
                    "broker dropped duplicate message"
                ),
                Ok(response) => debug!(
                    %subject, %message_id, bytes, stream_sequence = response.ack.sequence, elapsed_ms,
                    "published"
                ),
                Err(e) => error!(
                    %subject, %message_id, bytes, elapsed_ms, error = %e,
                    "publish failed"
                ),
            }

            result
        })
    }
}
