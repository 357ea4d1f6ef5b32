//! MQTT / Home Assistant bridge for the Carrot light cache.
//!
//! The [`Bridge`] follows a [`LightHub`](carrot_core::LightHub) and mirrors
//! every light onto the bus as a Home Assistant MQTT light (JSON schema).
//! Commands arriving on `…/set` topics are forwarded to the cloud, echoed,
//! and only then acknowledged. A message on the Home Assistant status topic
//! republishes everything, covering a controller restart that lost its
//! retained discovery state.
//!
//! The bus sits behind [`BusClient`]; [`mqtt`] provides the `rumqttc`
//! implementation and the event-loop driver.

pub mod bridge;
pub mod bus;
pub mod error;
pub mod mqtt;
pub mod payload;
pub mod topics;

pub use bridge::Bridge;
pub use bus::{BusClient, Delivery};
pub use error::BridgeError;
pub use mqtt::{MqttBus, MqttDriver, MqttSettings, ReconnectConfig};
pub use payload::{DiscoveryPayload, StatePayload};
pub use topics::TopicScheme;
