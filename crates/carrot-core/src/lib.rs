//! Polling light cache and change distribution for `carrot-home`.
//!
//! - **[`CacheEngine`]**: polls the Carrot cloud through a [`LightService`],
//!   diffs each result against the last known [`DeviceSet`] and broadcasts
//!   the resulting [`Change`] batches. A second loop renews the shared
//!   session on a fixed schedule.
//!
//! - **[`LightHub`]**: shares one engine between subscribers. The engine is
//!   started by the first [`connect`](LightHub::connect) and stopped when the
//!   last [`LightStream`] is dropped.
//!
//! - **[`LightStream`]**: a subscriber's view. Opens with a baseline of
//!   `Added` events for every known light, then follows live batches.
//!
//! - **Domain model** ([`model`]): [`DeviceId`], [`LightState`], [`Light`],
//!   and [`Change`].

pub mod config;
pub mod engine;
pub mod error;
pub mod hub;
pub mod model;
pub mod service;
pub mod store;
pub mod stream;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AccountCredentials, CacheConfig};
pub use engine::CacheEngine;
pub use error::CoreError;
pub use hub::{LightFilter, LightHub};
pub use model::{Change, DeviceId, InvalidDeviceId, Light, LightState};
pub use service::{CarrotAccount, LightService};
pub use store::{CacheState, ChangeBatch, DeviceSet, LightStore};
pub use stream::LightStream;
