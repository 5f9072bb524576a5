use super::transport::{BusError, BusEvent, BusTransport};
use crate::config::MqttConfig;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

const REQUEST_CHANNEL_CAPACITY: usize = 16;

pub struct MqttTransport {
    options: MqttOptions,
    session: Option<(AsyncClient, EventLoop)>,
}

impl MqttTransport {
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.get_keep_alive());
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        Self {
            options,
            session: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, BusError> {
        self.session
            .as_ref()
            .map(|(client, _)| client)
            .ok_or(BusError::NotConnected)
    }
}

#[async_trait]
impl BusTransport for MqttTransport {
    async fn connect(&mut self) -> Result<(), BusError> {
        self.session = None;
        let (client, mut event_loop) =
            AsyncClient::new(self.options.clone(), REQUEST_CHANNEL_CAPACITY);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => break,
                Ok(_) => continue,
                Err(e) => return Err(BusError::Connection(e.to_string())),
            }
        }

        tracing::info!(
            host = %self.options.broker_address().0,
            port = self.options.broker_address().1,
            "Connected to MQTT broker"
        );
        self.session = Some((client, event_loop));
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.client()?
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BusError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn next_event(&mut self) -> Result<BusEvent, BusError> {
        let (_, event_loop) = self.session.as_mut().ok_or(BusError::NotConnected)?;

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(BusEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    })
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.session = None;
                    return Ok(BusEvent::Disconnected);
                }
                Ok(_) => continue,
                Err(e) => {
                    self.session = None;
                    return Err(BusError::Connection(e.to_string()));
                }
            }
        }
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.client()?
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}
