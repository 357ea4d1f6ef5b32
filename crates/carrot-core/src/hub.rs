// ── Light hub ──
//
// Shares one cache engine between any number of subscribers. The engine
// is spawned by the first `connect`, kept alive by the `Lease` each
// stream holds, and cancelled when the last lease drops. The next
// subscriber after that starts a fresh engine with an empty set and a
// fresh login.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::engine::CacheEngine;
use crate::error::CoreError;
use crate::model::Light;
use crate::service::LightService;
use crate::store::LightStore;
use crate::stream::LightStream;

/// Per-subscriber predicate restricting which lights a stream reports.
pub type LightFilter = Arc<dyn Fn(&Light) -> bool + Send + Sync>;

/// Entry point to the light cache. Cheap to clone; clones share the engine.
pub struct LightHub<S> {
    inner: Arc<HubInner<S>>,
}

struct HubInner<S> {
    service: Arc<S>,
    config: CacheConfig,
    /// Parent of every engine token; cancelling it stops whichever engine runs.
    cancel: CancellationToken,
    slot: Arc<Mutex<Slot>>,
}

#[derive(Default)]
struct Slot {
    engine: Option<RunningEngine>,
    subscribers: usize,
}

#[derive(Clone)]
struct RunningEngine {
    store: Arc<LightStore>,
    cancel: CancellationToken,
}

impl<S> Clone for LightHub<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: LightService> LightHub<S> {
    pub fn new(service: Arc<S>, config: CacheConfig, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(HubInner {
                service,
                config,
                cancel,
                slot: Arc::new(Mutex::new(Slot::default())),
            }),
        }
    }

    /// The remote service the engines poll (commands go straight to it).
    pub fn service(&self) -> &Arc<S> {
        &self.inner.service
    }

    /// Subscribe to light changes, optionally restricted by `filter`.
    ///
    /// The stream opens with a baseline of every matching light already in
    /// the cache, then follows live changes.
    pub fn connect(&self, filter: Option<LightFilter>) -> LightStream {
        LightStream::new(self.acquire(), filter)
    }

    /// Current lights, once the running engine has completed a poll.
    ///
    /// Starts an engine if none is running and holds it only for the
    /// duration of the call.
    pub async fn snapshot(&self) -> Result<Vec<Light>, CoreError> {
        let lease = self.acquire();
        let mut watch = lease.store().watch();
        let first_poll = async {
            let state = watch
                .wait_for(|state| state.polls > 0)
                .await
                .map_err(|_| CoreError::CacheStopped)?;
            Ok::<_, CoreError>(state.lights.to_vec())
        };

        tokio::select! {
            biased;
            () = lease.cancelled() => Err(CoreError::CacheStopped),
            result = first_poll => result,
        }
    }

    /// Current lights without waiting or starting an engine.
    ///
    /// `None` while no engine runs or before its first completed poll.
    pub fn current(&self) -> Option<Vec<Light>> {
        let slot = lock(&self.inner.slot);
        let store = &slot.engine.as_ref()?.store;
        (store.polls() > 0).then(|| store.snapshot().to_vec())
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.slot).subscribers
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.slot).engine.is_some()
    }

    fn acquire(&self) -> Lease {
        let mut slot = lock(&self.inner.slot);
        let engine = match &slot.engine {
            Some(engine) => engine.clone(),
            None => {
                let engine = self.spawn_engine();
                slot.engine = Some(engine.clone());
                engine
            }
        };
        slot.subscribers += 1;
        debug!(subscribers = slot.subscribers, "light hub subscriber joined");

        Lease {
            slot: Arc::clone(&self.inner.slot),
            engine,
        }
    }

    fn spawn_engine(&self) -> RunningEngine {
        let cancel = self.inner.cancel.child_token();
        let engine = CacheEngine::new(Arc::clone(&self.inner.service), self.inner.config.clone());
        let store = Arc::clone(engine.store());

        let token = cancel.clone();
        tokio::spawn(async move { engine.run(token).await });
        info!("light cache engine spawned");

        RunningEngine { store, cancel }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Lease ────────────────────────────────────────────────────────────

/// One subscriber's claim on the running engine.
pub(crate) struct Lease {
    slot: Arc<Mutex<Slot>>,
    engine: RunningEngine,
}

impl Lease {
    pub(crate) fn store(&self) -> &Arc<LightStore> {
        &self.engine.store
    }

    /// Resolves once the engine this lease points at has been stopped.
    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.engine.cancel.cancelled()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        slot.subscribers = slot.subscribers.saturating_sub(1);
        debug!(subscribers = slot.subscribers, "light hub subscriber left");
        if slot.subscribers == 0 {
            if let Some(engine) = slot.engine.take() {
                engine.cancel.cancel();
                info!("last subscriber left; light cache engine stopped");
            }
        }
    }
}
