use anyhow::Result;
use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;

/// A single message delivered by a pull consumer.
///
/// Owns the ack handle so the consumer loop can settle it after processing.
#[async_trait]
pub trait InboundMessage: Send + Sync {
    fn subject(&self) -> &str;

    fn payload(&self) -> Bytes;

    fn headers(&self) -> Option<HeaderMap>;

    /// Acknowledge; the message will not be redelivered
    async fn ack(&self) -> Result<()>;

    /// Negative-acknowledge; the message is redelivered
    async fn nak(&self) -> Result<()>;
}

/// Trait for JetStream consumer operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    /// Create (or bind to) a durable pull consumer on a stream
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for pull consumer operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch up to `max_messages`, waiting at most `expires` for the batch to fill
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<Box<dyn InboundMessage>>>;
}

/// Trait for JetStream publisher operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    /// Publish a message with headers to a subject and await the stream acknowledgment
    async fn publish_with_headers(
        &self,
        subject: String,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<()>;
}
