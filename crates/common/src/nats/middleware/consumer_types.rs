use async_nats::HeaderMap;
use bytes::Bytes;

/// One consumed message, owned so it can move through Tower layers
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub subject: String,
    pub payload: Bytes,
    /// Carries the publisher's trace context when present
    pub headers: Option<HeaderMap>,
}

impl ConsumeRequest {
    pub fn new(subject: String, payload: Bytes, headers: Option<HeaderMap>) -> Self {
        Self {
            subject,
            payload,
            headers,
        }
    }

    /// Last token of the subject, i.e. the partition key the publisher used
    pub fn subject_key(&self) -> &str {
        self.subject.rsplit('.').next().unwrap_or_default()
    }
}

/// Settlement decision for a consumed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResponse {
    /// Done with the message; never redeliver
    Ack,
    /// Redeliver later
    Nak(Option<String>),
}

impl ConsumeResponse {
    pub fn ack() -> Self {
        Self::Ack
    }

    pub fn nak(reason: impl Into<String>) -> Self {
        Self::Nak(Some(reason.into()))
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}
