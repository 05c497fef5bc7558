use crate::nats::StreamAck;
use async_nats::HeaderMap;
use bytes::Bytes;
use std::time::Duration;

/// JetStream header used for broker-side deduplication
pub const MSG_ID_HEADER: &str = "Nats-Msg-Id";

/// Request to publish a message to NATS
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// The subject to publish to
    pub subject: String,
    /// The message payload
    pub payload: Bytes,
    /// Headers sent with the message (trace context is injected here)
    pub headers: HeaderMap,
}

impl PublishRequest {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Tag the message so JetStream drops repeats inside the duplicate window
    pub fn with_message_id(mut self, message_id: &str) -> Self {
        self.headers.insert(MSG_ID_HEADER, message_id);
        self
    }

    pub fn message_id(&self) -> Option<&str> {
        self.headers.get(MSG_ID_HEADER).map(|v| v.as_str())
    }
}

/// Response from an acknowledged publish
#[derive(Debug, Clone)]
pub struct PublishResponse {
    /// The subject published to
    pub subject: String,
    pub ack: StreamAck,
}

/// Errors surfaced by the publisher middleware stack
#[derive(Debug, thiserror::Error)]
pub enum NatsPublishError {
    #[error("publish to {subject} timed out after {timeout:?}")]
    Timeout { subject: String, timeout: Duration },

    #[error("publish to {subject} failed after {attempts} attempts: {source:#}")]
    Exhausted {
        subject: String,
        attempts: u32,
        source: anyhow::Error,
    },

    #[error("{0:#}")]
    Failed(#[from] anyhow::Error),
}

/// Swap the readied inner service out for a fresh clone.
///
/// Tower only lets `call` run on the instance that returned `Ready`, so the
/// clone stays behind for the next `poll_ready` and the readied one moves
/// into the response future.
pub(crate) fn take_ready<S: Clone>(inner: &mut S) -> S {
    let fresh = inner.clone();
    std::mem::replace(inner, fresh)
}
