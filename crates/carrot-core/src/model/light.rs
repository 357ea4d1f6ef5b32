// ── Light identity and state ──
//
// `DeviceId` is the stable integer the Carrot cloud assigns. `LightState`
// has two encodings: the symbolic "ON"/"OFF" used on the bus, and the
// numeric control value the cloud speaks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use carrot_api::{LIGHT_OFF, LIGHT_ON, LightStatus};

// ── DeviceId ────────────────────────────────────────────────────────

/// Identifier the Carrot cloud assigns to a light.
///
/// Formats and parses as plain decimal, so every id survives a round trip
/// through a topic segment unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for DeviceId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A string that is not a canonical decimal device id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid device id: {0:?}")]
pub struct InvalidDeviceId(pub String);

impl FromStr for DeviceId {
    type Err = InvalidDeviceId;

    /// Accepts ASCII digits only; signs, whitespace and overflow are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidDeviceId(s.to_owned()));
        }
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| InvalidDeviceId(s.to_owned()))
    }
}

// ── LightState ──────────────────────────────────────────────────────

/// Binary light state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LightState {
    On,
    Off,
}

impl LightState {
    /// Control value sent to the cloud. Strict: only 64 or 0.
    pub const fn code(self) -> u32 {
        match self {
            Self::On => LIGHT_ON,
            Self::Off => LIGHT_OFF,
        }
    }

    /// Interpret a value reported by the cloud. Lenient: zero is off,
    /// everything else is on.
    pub const fn from_code(code: u32) -> Self {
        if code == LIGHT_OFF { Self::Off } else { Self::On }
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Light ───────────────────────────────────────────────────────────

/// Immutable snapshot of one light. A state change produces a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Light {
    pub id: DeviceId,
    pub state: LightState,
}

impl Light {
    pub const fn new(id: DeviceId, state: LightState) -> Self {
        Self { id, state }
    }
}

impl From<LightStatus> for Light {
    fn from(status: LightStatus) -> Self {
        let state = if status.value.is_on() {
            LightState::On
        } else {
            LightState::Off
        };
        Self::new(DeviceId(status.device_id), state)
    }
}
