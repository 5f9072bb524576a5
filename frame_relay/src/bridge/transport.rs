use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Connection to broker failed: {0}")]
    Connection(String),
    #[error("Subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("Not connected to broker")]
    NotConnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Message { topic: String, payload: Bytes },
    /// The broker closed the session.
    Disconnected,
}

/// Connection to a publish/subscribe broker.
///
/// `connect` opens a fresh session and only returns once the broker has
/// accepted it; `next_event` blocks until something arrives on that session.
#[async_trait]
pub trait BusTransport: Send + 'static {
    async fn connect(&mut self) -> Result<(), BusError>;
    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;
    async fn next_event(&mut self) -> Result<BusEvent, BusError>;
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;
}
