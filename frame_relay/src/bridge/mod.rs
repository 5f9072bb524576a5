//! Message-bus trigger bridge.
//!
//! Keeps one subscription to the trigger topic alive, runs an analysis for
//! every message that arrives on it and publishes the result to the ack
//! topic. The loop walks an explicit state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Subscribed -> Dispatching -> Subscribed
//!      ^              |              |
//!      +---- backoff -+--------------+ (connection lost)
//! ```

mod mqtt;
mod transport;

pub use mqtt::MqttTransport;
pub use transport::{BusError, BusEvent, BusTransport};

use crate::{analysis::TriggerSource, config::MqttConfig, dispatch::Dispatcher};
use bytes::Bytes;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, watch},
    time::sleep,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Subscribed,
    Dispatching,
}

/// Exponential reconnect delay with jitter, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        let jitter = rand::random::<f64>() * 0.2 + 0.9;
        Duration::try_from_secs_f64(base.as_secs_f64() * jitter).unwrap_or(base)
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

enum SessionEnd {
    Shutdown,
    Lost(BusError),
}

pub struct TriggerBridge<T: BusTransport> {
    transport: T,
    dispatcher: Arc<Dispatcher>,
    trigger_topic: String,
    ack_topic: String,
    backoff: Backoff,
    state_tx: watch::Sender<BridgeState>,
}

impl<T: BusTransport> TriggerBridge<T> {
    pub fn new(transport: T, dispatcher: Arc<Dispatcher>, config: &MqttConfig) -> Self {
        let (state_tx, _) = watch::channel(BridgeState::Disconnected);
        if rumqttc::matches(&config.ack_topic, &config.trigger_topic) {
            tracing::warn!(
                ack_topic = %config.ack_topic,
                trigger_topic = %config.trigger_topic,
                "Ack topic matches the trigger filter, acks will be ignored"
            );
        }
        Self {
            transport,
            dispatcher,
            trigger_topic: config.trigger_topic.clone(),
            ack_topic: config.ack_topic.clone(),
            backoff: Backoff::new(config.get_initial_backoff(), config.get_max_backoff()),
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<BridgeState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: BridgeState) {
        self.state_tx.send_replace(state);
    }

    /// Runs until a shutdown signal arrives. Broker failures never end the
    /// loop; they only delay the next session.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            self.set_state(BridgeState::Connecting);
            let opened = tokio::select! {
                result = self.open_session() => result,
                _ = shutdown_rx.recv() => break,
            };

            match opened {
                Ok(()) => {
                    self.backoff.reset();
                    self.set_state(BridgeState::Subscribed);
                    tracing::info!(
                        topic = %self.trigger_topic,
                        "Listening for analysis triggers"
                    );

                    match self.receive(&mut shutdown_rx).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Lost(err) => {
                            tracing::warn!("Lost message bus session: {}", err);
                        }
                    }
                }
                Err(err) => {
                    tracing::error!("Failed to open message bus session: {}", err);
                }
            }

            self.set_state(BridgeState::Disconnected);
            let delay = self.backoff.next_delay();
            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting to message bus");
            tokio::select! {
                _ = sleep(delay) => {},
                _ = shutdown_rx.recv() => break,
            }
        }

        self.set_state(BridgeState::Disconnected);
        tracing::info!("Trigger bridge stopped");
    }

    async fn open_session(&mut self) -> Result<(), BusError> {
        self.transport.connect().await?;
        self.transport.subscribe(&self.trigger_topic).await
    }

    async fn receive(&mut self, shutdown_rx: &mut broadcast::Receiver<()>) -> SessionEnd {
        loop {
            let event = tokio::select! {
                event = self.transport.next_event() => event,
                _ = shutdown_rx.recv() => return SessionEnd::Shutdown,
            };

            match event {
                Ok(BusEvent::Message { topic, payload }) => {
                    if !rumqttc::matches(&topic, &self.trigger_topic) {
                        tracing::debug!(topic = %topic, "Ignoring message outside the trigger topic");
                        continue;
                    }
                    if let Err(err) = self.handle_trigger(&topic, payload).await {
                        return SessionEnd::Lost(err);
                    }
                }
                Ok(BusEvent::Disconnected) => {
                    return SessionEnd::Lost(BusError::Connection(
                        "broker closed the session".into(),
                    ));
                }
                Err(err) => return SessionEnd::Lost(err),
            }
        }
    }

    async fn handle_trigger(&mut self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        tracing::info!(
            topic,
            payload = %String::from_utf8_lossy(&payload),
            "Received analysis trigger"
        );

        self.set_state(BridgeState::Dispatching);
        let result = self.dispatcher.run_ai(TriggerSource::Bus).await;

        let published = match serde_json::to_vec(&result) {
            Ok(body) => self.transport.publish(&self.ack_topic, body).await,
            Err(err) => {
                tracing::error!("Failed to serialize analysis result: {}", err);
                Ok(())
            }
        };

        self.set_state(BridgeState::Subscribed);
        published
    }
}
