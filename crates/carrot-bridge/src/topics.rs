//! MQTT topic layout for Home Assistant discovery.
//!
//! Every light lives under `<discovery>/light/<object_prefix><id>/` with
//! `config`, `state` and `set` leaves. Command echoes go to a separate
//! namespace so they never collide with discovery.

use carrot_core::DeviceId;

/// Topic naming for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    discovery_prefix: String,
    echo_prefix: String,
    object_prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new("homeassistant", "carrot", "carrothome")
    }
}

impl TopicScheme {
    pub fn new(
        discovery_prefix: impl Into<String>,
        echo_prefix: impl Into<String>,
        object_prefix: impl Into<String>,
    ) -> Self {
        Self {
            discovery_prefix: discovery_prefix.into(),
            echo_prefix: echo_prefix.into(),
            object_prefix: object_prefix.into(),
        }
    }

    /// `carrothome<id>`: doubles as the entity name and unique id.
    pub fn object_id(&self, id: DeviceId) -> String {
        format!("{}{id}", self.object_prefix)
    }

    /// `homeassistant/light/carrothome<id>`, the `~` root in discovery.
    pub fn base_topic(&self, id: DeviceId) -> String {
        format!("{}/light/{}", self.discovery_prefix, self.object_id(id))
    }

    pub fn config_topic(&self, id: DeviceId) -> String {
        format!("{}/config", self.base_topic(id))
    }

    pub fn state_topic(&self, id: DeviceId) -> String {
        format!("{}/state", self.base_topic(id))
    }

    pub fn command_topic(&self, id: DeviceId) -> String {
        format!("{}/set", self.base_topic(id))
    }

    /// Where accepted commands are echoed: `carrot/light/carrothome<id>/state`.
    pub fn echo_topic(&self, id: DeviceId) -> String {
        format!("{}/light/{}/state", self.echo_prefix, self.object_id(id))
    }

    /// Subscription filter covering every light's command topic.
    pub fn command_filter(&self) -> String {
        format!("{}/light/+/set", self.discovery_prefix)
    }

    /// Home Assistant's birth / last-will topic.
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.discovery_prefix)
    }

    /// Recover the device id from a command topic.
    ///
    /// `None` for foreign topics and for id segments that are empty,
    /// non-numeric, or out of range.
    pub fn parse_command_topic(&self, topic: &str) -> Option<DeviceId> {
        let rest = topic.strip_prefix(self.discovery_prefix.as_str())?;
        let rest = rest.strip_prefix("/light/")?;
        let rest = rest.strip_prefix(self.object_prefix.as_str())?;
        let id = rest.strip_suffix("/set")?;
        id.parse().ok()
    }
}
