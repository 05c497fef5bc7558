use axum::http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{error, info, info_span, Instrument};

/// Configuration for HTTP request logging
#[derive(Clone, Debug)]
pub struct RequestLoggingConfig {
    /// Path prefixes that are served without a log line (health checks and metric scrapes)
    pub ignored_paths: Vec<String>,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            ignored_paths: vec!["/telemetry/health".to_string(), "/metrics".to_string()],
        }
    }
}

impl RequestLoggingConfig {
    fn should_ignore(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

/// Tower layer that opens a span per request and logs its outcome
#[derive(Clone, Debug, Default)]
pub struct RequestLoggingLayer {
    config: RequestLoggingConfig,
}

impl RequestLoggingLayer {
    pub fn new(config: RequestLoggingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for RequestLoggingLayer {
    type Service = RequestLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RequestLoggingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RequestLoggingService<S> {
    inner: S,
    config: RequestLoggingConfig,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLoggingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let should_ignore = self.config.should_ignore(&path);
        let span = info_span!("http_request", http.method = %method, http.route = %path);
        let start = Instant::now();
        let future = {
            let _guard = span.enter();
            self.inner.call(req)
        };

        Box::pin(
            async move {
                let result = future.await;

                if !should_ignore {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    match &result {
                        Ok(response) => info!(
                            method = %method,
                            path = %path,
                            http_status = response.status().as_u16(),
                            duration_ms,
                            "{} {} - {} - {}ms",
                            method,
                            path,
                            response.status().as_u16(),
                            duration_ms
                        ),
                        Err(e) => error!(
                            method = %method,
                            path = %path,
                            duration_ms,
                            error = %e,
                            "{} {} - ERROR: {}",
                            method,
                            path,
                            e
                        ),
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
