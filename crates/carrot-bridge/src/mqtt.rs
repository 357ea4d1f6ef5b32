//! MQTT transport built on `rumqttc`.
//!
//! [`connect`] splits a broker connection into two halves: [`MqttBus`],
//! the cheap request side the bridge publishes through, and
//! [`MqttDriver`], which owns the event loop. The driver must be running
//! for any request to reach the broker. It reconnects with exponential
//! backoff, restores subscriptions after a clean reconnect, and hands
//! every inbound publish to the bridge on its own task, so commands for
//! different lights are processed concurrently.

use std::time::Duration;

use carrot_core::LightService;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS, Transport};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::bus::{BusClient, Delivery};
use crate::error::BridgeError;

/// Requests buffered between the bus handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// How long shutdown waits for the disconnect to be flushed.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

// ── Settings ─────────────────────────────────────────────────────────

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub client_id: String,
    pub keep_alive: Duration,
}

/// Exponential backoff between reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay after the first failure. Default: 1s.
    pub initial_delay: Duration,
    /// Upper bound on the delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Build `rumqttc` options: manual acks, clean session, optional TLS.
pub fn mqtt_options(settings: &MqttSettings) -> Result<MqttOptions, BridgeError> {
    // `MqttOptions::new` panics on these.
    if settings.client_id.is_empty() || settings.client_id.starts_with(' ') {
        return Err(BridgeError::Transport {
            message: format!("invalid MQTT client id {:?}", settings.client_id),
        });
    }

    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    // Clean session: unacknowledged deliveries do not outlive a reconnect.
    options
        .set_keep_alive(settings.keep_alive)
        .set_clean_session(true)
        .set_manual_acks(true);

    if let Some(user) = &settings.user {
        let password = settings
            .password
            .as_ref()
            .map(|p| p.expose_secret().to_owned())
            .unwrap_or_default();
        options.set_credentials(user, password);
    }

    if settings.use_tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    Ok(options)
}

/// Create the bus handle and its driver. Nothing touches the network until
/// [`MqttDriver::run`] polls the event loop.
pub fn connect(
    settings: &MqttSettings,
    reconnect: ReconnectConfig,
) -> Result<(MqttBus, MqttDriver), BridgeError> {
    let options = mqtt_options(settings)?;
    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    info!(
        host = %settings.host,
        port = settings.port,
        tls = settings.use_tls,
        "MQTT client configured"
    );

    Ok((
        MqttBus {
            client: client.clone(),
        },
        MqttDriver {
            client,
            eventloop,
            reconnect,
        },
    ))
}

// ── Bus handle ───────────────────────────────────────────────────────

/// Request side of the broker connection.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl Delivery for Publish {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl BusClient for MqttBus {
    type Delivery = Publish;

    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), BridgeError> {
        debug!(topic, retain, bytes = payload.len(), "MQTT publish");
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), BridgeError> {
        debug!(filter, "MQTT subscribe");
        self.client.subscribe(filter, QoS::AtLeastOnce).await?;
        Ok(())
    }

    async fn ack(&self, delivery: &Publish) -> Result<(), BridgeError> {
        self.client.ack(delivery).await?;
        Ok(())
    }
}

// ── Driver ───────────────────────────────────────────────────────────

/// Owns the `rumqttc` event loop.
pub struct MqttDriver {
    client: AsyncClient,
    eventloop: EventLoop,
    reconnect: ReconnectConfig,
}

impl MqttDriver {
    /// Poll the connection until `cancel` fires, dispatching inbound
    /// publishes to `bridge`.
    pub async fn run<S: LightService>(mut self, bridge: Bridge<S, MqttBus>, cancel: CancellationToken) {
        let subscriptions = bridge.subscriptions();
        let mut attempt: u32 = 0;
        let mut connected_before = false;

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(session_present = ack.session_present, "connected to MQTT broker");
                    attempt = 0;
                    // The first subscriptions come from the bridge itself; a clean
                    // reconnect drops them broker-side.
                    if connected_before && !ack.session_present {
                        self.resubscribe(&subscriptions);
                    }
                    connected_before = true;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let bridge = bridge.clone();
                    tokio::spawn(async move {
                        let topic = publish.topic.clone();
                        if let Err(e) = bridge.handle(publish).await {
                            warn!(topic = %topic, error = %e, "inbound message left unacknowledged");
                        }
                    });
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff(attempt, &self.reconnect);
                    warn!(error = %e, attempt, retry_in = ?delay, "MQTT connection error");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }

        match self.client.try_disconnect() {
            Ok(()) => {
                // The request only reaches the broker while the loop is polled.
                let flush = async { while self.eventloop.poll().await.is_ok() {} };
                if tokio::time::timeout(DISCONNECT_GRACE, flush).await.is_err() {
                    debug!("MQTT disconnect not confirmed before timeout");
                }
            }
            Err(e) => debug!(error = %e, "MQTT disconnect request not queued"),
        }
        info!("MQTT driver stopped");
    }

    // Awaiting the request channel here would stall: this task is the one
    // draining it.
    fn resubscribe(&self, filters: &[String]) {
        for filter in filters {
            if let Err(e) = self.client.try_subscribe(filter, QoS::AtLeastOnce) {
                warn!(filter = %filter, error = %e, "failed to restore subscription");
            }
        }
    }
}

/// `initial * 2^attempt`, capped at `max_delay`.
fn backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
    config
        .initial_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}
