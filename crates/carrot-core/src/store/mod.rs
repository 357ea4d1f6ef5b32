// ── Light state storage ──
//
// `DeviceSet` is the plain value (id -> light, with diffing); `LightStore`
// wraps it with the channels subscribers join through.

mod device_set;
mod light_store;

pub use device_set::DeviceSet;
pub use light_store::{CacheState, ChangeBatch, LightStore};
