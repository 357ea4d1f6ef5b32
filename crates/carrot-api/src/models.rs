// Carrot servlet response types
//
// The servlets answer with flat JSON objects carrying a `result` marker.
// Fields use `#[serde(default)]` because failed responses routinely omit
// everything but the marker.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::lights::LightCode;

// ── Result marker ────────────────────────────────────────────────────

/// The `result` field every servlet response carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationResult {
    Success,
    #[default]
    #[serde(other)]
    Fail,
}

impl OperationResult {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

// ── Login ────────────────────────────────────────────────────────────

/// Response from `LoginServlet?action=login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub result: OperationResult,
    #[serde(default, alias = "msg")]
    pub message: Option<String>,
}

// ── Light status ─────────────────────────────────────────────────────

/// Response from `CarrotControlServlet?action=getlightstatus`.
///
/// Entries stay raw until [`into_statuses`](Self::into_statuses) so one
/// malformed device cannot fail the whole poll.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LightStatusResponse {
    #[serde(default)]
    pub result: OperationResult,
    #[serde(default)]
    pub devices: Vec<serde_json::Value>,
}

impl LightStatusResponse {
    /// Decode every entry on its own, skipping (and logging) the ones that
    /// do not describe a light.
    pub fn into_statuses(self) -> Vec<LightStatus> {
        self.devices
            .into_iter()
            .filter_map(|entry| match LightStatus::deserialize(&entry) {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!(%entry, error = %e, "skipping malformed light status entry");
                    None
                }
            })
            .collect()
    }
}

/// One entry of the light status list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LightStatus {
    #[serde(rename = "deviceid")]
    pub device_id: u32,
    #[serde(default)]
    pub value: LightCode,
}
