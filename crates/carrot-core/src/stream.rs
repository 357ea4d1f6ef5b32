// ── Light change streams ──
//
// Subscription handle vended by `LightHub::connect`. Each stream holds a
// lease on the shared engine and a private view of the lights it has
// reported, so filtering and lag recovery stay local to one subscriber.

use std::sync::Arc;

use futures_core::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::hub::{Lease, LightFilter};
use crate::model::{Change, Light};
use crate::store::{ChangeBatch, DeviceSet};

/// A live sequence of change batches, starting with a baseline replay.
///
/// The first batch holds one `Added` per light currently in the cache
/// (skipped when the cache is empty); every batch after that comes from a
/// poll. Dropping the stream releases its lease on the engine.
pub struct LightStream {
    lease: Lease,
    filter: Option<LightFilter>,
    /// Lights this subscriber has been told about, in their reported state.
    view: DeviceSet,
    rx: tokio::sync::broadcast::Receiver<ChangeBatch>,
    baseline: Option<ChangeBatch>,
}

impl LightStream {
    pub(crate) fn new(lease: Lease, filter: Option<LightFilter>) -> Self {
        let (current, rx) = lease.store().join();
        let view: DeviceSet = current
            .iter()
            .filter(|light| admits(filter.as_ref(), light))
            .copied()
            .collect();
        let baseline = view.baseline();
        Self {
            lease,
            filter,
            view,
            rx,
            baseline: (!baseline.is_empty()).then(|| baseline.into()),
        }
    }

    /// Lights this subscriber currently knows about.
    pub fn view(&self) -> &DeviceSet {
        &self.view
    }

    /// Wait for the next batch.
    ///
    /// Returns `None` once the engine behind this stream has been stopped
    /// (process shutdown). Batches are never empty.
    pub async fn next(&mut self) -> Option<ChangeBatch> {
        if let Some(baseline) = self.baseline.take() {
            return Some(baseline);
        }

        loop {
            let received = tokio::select! {
                biased;
                () = self.lease.cancelled() => return None,
                received = self.rx.recv() => received,
            };

            let batch = match received {
                Ok(batch) => self.project(&batch),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "light stream fell behind; resynchronising");
                    self.resync()
                }
                Err(RecvError::Closed) => return None,
            };

            if !batch.is_empty() {
                return Some(batch.into());
            }
        }
    }

    /// Convert into a `Stream` of individual changes.
    pub fn into_stream(mut self) -> impl Stream<Item = Change> + Send {
        async_stream::stream! {
            while let Some(batch) = self.next().await {
                for change in batch.iter() {
                    yield *change;
                }
            }
        }
    }

    /// Translate an upstream batch into this subscriber's terms and fold
    /// it into the view.
    fn project(&mut self, batch: &[Change]) -> Vec<Change> {
        let mut out = Vec::with_capacity(batch.len());
        for change in batch {
            let id = change.id();
            let known = self.view.get(id).copied();
            let wanted = change
                .light()
                .filter(|light| admits(self.filter.as_ref(), light))
                .copied();

            match (known, wanted) {
                (None, Some(light)) => out.push(Change::Added(light)),
                (Some(old), Some(light)) if old != light => out.push(Change::Updated(light)),
                (Some(_), None) => out.push(Change::Removed(id)),
                _ => {}
            }
        }
        self.view.apply(&out);
        out
    }

    /// Re-join the store after losing batches and report only the net
    /// difference between what this subscriber knows and what is true now.
    fn resync(&mut self) -> Vec<Change> {
        let (current, rx) = self.lease.store().join();
        self.rx = rx;
        let target: Vec<Light> = current
            .iter()
            .filter(|light| admits(self.filter.as_ref(), light))
            .copied()
            .collect();
        let (next, changes) = self.view.diff(target);
        debug!(changes = changes.len(), "light stream resynchronised");
        self.view = next;
        changes
    }
}

impl std::fmt::Debug for LightStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightStream")
            .field("filtered", &self.filter.is_some())
            .field("view", &self.view.len())
            .finish_non_exhaustive()
    }
}

fn admits(filter: Option<&LightFilter>, light: &Light) -> bool {
    filter.is_none_or(|f| f(light))
}

/// Wrap a predicate as a [`LightFilter`].
pub fn filter<F>(predicate: F) -> LightFilter
where
    F: Fn(&Light) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::CacheConfig;
    use crate::hub::LightHub;
    use crate::model::{DeviceId, LightState};
    use crate::test_support::ScriptedService;

    fn light(id: u32, state: LightState) -> Light {
        Light::new(DeviceId::new(id), state)
    }

    #[tokio::test(start_paused = true)]
    async fn into_stream_flattens_batches() {
        let service = Arc::new(ScriptedService::new());
        service.push_poll(Ok(vec![light(1, LightState::On), light(2, LightState::Off)]));
        service.push_poll(Ok(vec![light(2, LightState::Off)]));
        let hub = LightHub::new(service, CacheConfig::default(), CancellationToken::new());

        let changes: Vec<Change> = Box::pin(hub.connect(None).into_stream())
            .take(3)
            .collect()
            .await;
        assert_eq!(
            changes,
            vec![
                Change::Added(light(1, LightState::On)),
                Change::Added(light(2, LightState::Off)),
                Change::Removed(DeviceId::new(1)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_lights_outside_the_filter_stay_silent() {
        let service = Arc::new(ScriptedService::new());
        service.push_poll(Ok(vec![light(1, LightState::On), light(2, LightState::Off)]));
        service.push_poll(Ok(vec![light(1, LightState::On), light(2, LightState::On)]));
        service.push_poll(Ok(vec![light(1, LightState::Off), light(2, LightState::On)]));
        let hub = LightHub::new(service, CacheConfig::default(), CancellationToken::new());

        let only_one = filter(|l| l.id == DeviceId::new(1));
        let mut stream = hub.connect(Some(only_one));

        let first = stream.next().await.unwrap();
        assert_eq!(&*first, &[Change::Added(light(1, LightState::On))]);

        // The second poll only touches light 2, so the next batch is the third poll's.
        let next = stream.next().await.unwrap();
        assert_eq!(&*next, &[Change::Updated(light(1, LightState::Off))]);
        assert_eq!(stream.view().len(), 1);
    }
}
