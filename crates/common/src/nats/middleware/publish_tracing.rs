use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::types::{take_ready, PublishRequest, PublishResponse};
use crate::nats::trace_context::inject_trace_context;
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};

/// Attributes stamped on every publish span
#[derive(Clone, Debug, Default)]
pub struct PublishSpanConfig {
    /// Identifies the component publishing, e.g. `analytics_event_producer`
    pub client_id: String,
}

impl PublishSpanConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

/// Wraps each publish in a `nats_publish` span. The span's context goes into
/// the message headers so consumers continue the same trace.
#[derive(Clone)]
pub struct PublishSpanLayer {
    config: PublishSpanConfig,
}

impl PublishSpanLayer {
    pub fn new(config: PublishSpanConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for PublishSpanLayer {
    type Service = PublishSpanService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PublishSpanService {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PublishSpanService<S> {
    inner: S,
    config: PublishSpanConfig,
}

impl<S> PublishSpanService<S> {
    fn span_for(&self, req: &PublishRequest) -> Span {
        info_span!(
            target: "nats",
            "nats_publish",
            otel.name = %format!("{} publish", req.subject),
            otel.kind = "producer",
            otel.status_code = field::Empty,
            messaging.system = "nats",
            messaging.operation = "publish",
            messaging.client_id = %self.config.client_id,
            messaging.destination.name = %req.subject,
            messaging.message.id = req.message_id().unwrap_or_default(),
            messaging.message.body.size = req.payload.len(),
            messaging.nats.stream_sequence = field::Empty,
        )
    }
}

impl<S> Service<PublishRequest> for PublishSpanService<S>
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

    fn call(&mut self, mut req: PublishRequest) -> Self::Future {
        let span = self.span_for(&req);
        // headers carry the publish span, not the caller's
        span.in_scope(|| inject_trace_context(&mut req.headers));

        let fut = take_ready(&mut self.inner).call(req);
        let record_on = span.clone();

        Box::pin(
            async move {
                let result = fut.await;
                match &result {
                    Ok(response) => {
                        record_on.record("otel.status_code", "OK");
                        record_on.record("messaging.nats.stream_sequence", response.ack.sequence);
                    }
                    Err(_) => {
                        record_on.record("otel.status_code", "ERROR");
                    }
                }
                result
            }
            .instrument(span),
        )
    }
}
