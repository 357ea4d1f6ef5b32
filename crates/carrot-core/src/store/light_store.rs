// ── Reactive light store ──
//
// The cache engine's owned state. The current `DeviceSet` sits in a
// `watch` channel; change batches fan out over a `broadcast` channel.
// Every mutation happens inside `send_modify`, i.e. under the watch
// write lock, and joins read under the same lock, so a subscriber's
// baseline and its first live batch never overlap or leave a gap.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::DeviceSet;
use crate::model::{Change, Light};

/// One poll's worth of changes, shared by every subscriber.
pub type ChangeBatch = Arc<[Change]>;

/// Point-in-time view of the store.
#[derive(Debug, Clone, Default)]
pub struct CacheState {
    pub lights: Arc<DeviceSet>,
    /// Successful polls applied so far. Zero until the first one lands.
    pub polls: u64,
}

/// State owned by one cache engine instance.
///
/// Only the engine's poll loop calls [`apply_poll`](Self::apply_poll);
/// everyone else reads snapshots or joins the change stream.
pub struct LightStore {
    state: watch::Sender<CacheState>,
    changes: broadcast::Sender<ChangeBatch>,
}

impl LightStore {
    pub fn new(change_buffer: usize) -> Self {
        let (state, _) = watch::channel(CacheState::default());
        let (changes, _) = broadcast::channel(change_buffer.max(1));
        Self { state, changes }
    }

    /// Replace the set with a poll result and broadcast the difference.
    ///
    /// Returns the number of changes emitted.
    pub fn apply_poll(&self, incoming: Vec<Light>) -> usize {
        let mut emitted = 0;
        // `send_modify` updates unconditionally, even with zero receivers.
        self.state.send_modify(|state| {
            let (next, changes) = state.lights.diff(incoming);
            state.lights = Arc::new(next);
            state.polls += 1;
            emitted = changes.len();
            if !changes.is_empty() {
                // No subscribers is not an error.
                let _ = self.changes.send(changes.into());
            }
        });
        emitted
    }

    /// Current set (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<DeviceSet> {
        Arc::clone(&self.state.borrow().lights)
    }

    pub fn polls(&self) -> u64 {
        self.state.borrow().polls
    }

    /// Subscribe to state changes via a `watch::Receiver`.
    pub fn watch(&self) -> watch::Receiver<CacheState> {
        self.state.subscribe()
    }

    /// Take the current set and a change receiver positioned right after it.
    pub(crate) fn join(&self) -> (Arc<DeviceSet>, broadcast::Receiver<ChangeBatch>) {
        let state = self.state.borrow();
        let rx = self.changes.subscribe();
        (Arc::clone(&state.lights), rx)
    }
}
