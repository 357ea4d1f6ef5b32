// ── Light cache engine ──
//
// Keeps a `LightStore` fresh. Two loops run side by side until the
// cancellation token fires: the poll loop turns the stateless status
// servlet into change batches, and the renewal loop keeps the shared
// session alive. Neither loop stops for anything but cancellation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::service::LightService;
use crate::store::LightStore;

/// `tokio::time::interval` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// One polling cache over one [`LightService`].
pub struct CacheEngine<S> {
    service: Arc<S>,
    store: Arc<LightStore>,
    config: CacheConfig,
}

impl<S: LightService> CacheEngine<S> {
    /// Create an engine with an empty store. Nothing runs until [`run`](Self::run).
    pub fn new(service: Arc<S>, config: CacheConfig) -> Self {
        let store = Arc::new(LightStore::new(config.change_buffer));
        Self {
            service,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<LightStore> {
        &self.store
    }

    /// Run the poll and renewal loops until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("light cache engine started");
        tokio::join!(
            poll_task(&*self.service, &self.store, &self.config, &cancel),
            renewal_task(&*self.service, &self.config, &cancel),
        );
        info!("light cache engine stopped");
    }
}

// ── Background loops ─────────────────────────────────────────────

async fn poll_task<S: LightService>(
    service: &S,
    store: &LightStore,
    config: &CacheConfig,
    cancel: &CancellationToken,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(config.settle_delay) => {}
    }

    let mut interval = tokio::time::interval(config.poll_interval.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        // A panic inside one iteration must not take the cache down with it.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = AssertUnwindSafe(poll_once(service, store)).catch_unwind() => {
                if outcome.is_err() {
                    error!("light poll panicked; continuing with next tick");
                }
            }
        }
    }
}

async fn poll_once<S: LightService>(service: &S, store: &LightStore) {
    match service.light_status().await {
        Ok(lights) => {
            let changes = store.apply_poll(lights);
            if changes > 0 {
                debug!(changes, "light set changed");
            }
        }
        Err(e) => {
            warn!(error = %e, transient = e.is_transient(), "light poll failed");
        }
    }
}

async fn renewal_task<S: LightService>(
    service: &S,
    config: &CacheConfig,
    cancel: &CancellationToken,
) {
    // The first tick completes immediately: log in right away.
    let mut interval = tokio::time::interval(config.renewal_interval.max(MIN_PERIOD));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = AssertUnwindSafe(service.login()).catch_unwind() => match outcome {
                Ok(Ok(())) => info!("carrot session established"),
                Ok(Err(e)) => warn!(
                    error = %e,
                    retry_in = ?config.renewal_interval,
                    "session renewal failed"
                ),
                Err(_) => error!("session renewal panicked; continuing with next tick"),
            },
        }
    }
}
