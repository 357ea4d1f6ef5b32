// ── Change events ──
//
// The only way consumers learn about the light set. Produced by diffing
// two `DeviceSet`s; batches from one poll travel together.

use super::light::{DeviceId, Light};

/// One transition of the light set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A light the set did not contain.
    Added(Light),
    /// A known light whose state differs from the stored snapshot.
    Updated(Light),
    /// A light that disappeared from the poll result.
    Removed(DeviceId),
}

impl Change {
    pub fn id(&self) -> DeviceId {
        match self {
            Self::Added(light) | Self::Updated(light) => light.id,
            Self::Removed(id) => *id,
        }
    }

    /// The new snapshot carried by `Added`/`Updated`.
    pub fn light(&self) -> Option<&Light> {
        match self {
            Self::Added(light) | Self::Updated(light) => Some(light),
            Self::Removed(_) => None,
        }
    }
}
