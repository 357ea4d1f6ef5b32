//! Home Assistant MQTT payloads.
//!
//! Discovery uses the abbreviated keys and the `~` base-topic shorthand so
//! one light costs a few dozen bytes of retained state on the broker.

use carrot_core::LightState;
use serde::{Deserialize, Serialize};

/// Light discovery config for the JSON schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    /// Base topic that `~` expands to.
    #[serde(rename = "~")]
    pub base_topic: String,
    #[serde(rename = "stat_t")]
    pub state_topic: String,
    #[serde(rename = "cmd_t")]
    pub command_topic: String,
    pub schema: String,
}

impl DiscoveryPayload {
    /// Describe one light whose entity name and unique id are `object_id`.
    pub fn light(object_id: String, base_topic: String) -> Self {
        Self {
            name: object_id.clone(),
            unique_id: object_id,
            base_topic,
            state_topic: "~/state".into(),
            command_topic: "~/set".into(),
            schema: "json".into(),
        }
    }
}

/// `{"state":"ON"}` on the state, command and echo topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    pub state: LightState,
}

impl StatePayload {
    pub fn new(state: LightState) -> Self {
        Self { state }
    }
}
