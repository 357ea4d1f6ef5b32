// ── Message bus seam ──
//
// What the bridge needs from an MQTT client. `MqttBus` is the production
// implementation; bridge tests record calls in memory instead.

use std::future::Future;

use crate::error::BridgeError;

/// An inbound message awaiting acknowledgement.
pub trait Delivery: Send + Sync + 'static {
    fn topic(&self) -> &str;
    fn payload(&self) -> &[u8];
}

/// Outbound half of a message bus with manual acknowledgement.
pub trait BusClient: Send + Sync + 'static {
    type Delivery: Delivery;

    /// Queue a QoS 1 publish.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Tell the broker `delivery` has been handled.
    fn ack(&self, delivery: &Self::Delivery)
    -> impl Future<Output = Result<(), BridgeError>> + Send;
}
