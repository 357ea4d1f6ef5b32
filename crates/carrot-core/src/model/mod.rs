// ── Domain model ──
//
// Canonical light types shared by the cache, its subscribers, and the
// protocol bridge.

pub mod change;
pub mod light;

pub use change::Change;
pub use light::{DeviceId, InvalidDeviceId, Light, LightState};
