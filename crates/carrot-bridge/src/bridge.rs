// ── Protocol bridge ──
//
// Turns light changes into Home Assistant discovery and state messages,
// and Home Assistant commands into cloud calls. Per light the sequence is
// announce (discovery, then state), state updates, and finally a retained
// empty config that retracts the entity.

use std::sync::Arc;

use carrot_core::{Change, DeviceId, Light, LightHub, LightService};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{BusClient, Delivery};
use crate::error::BridgeError;
use crate::payload::{DiscoveryPayload, StatePayload};
use crate::topics::TopicScheme;

/// Bridge between one light hub and one message bus. Cheap to clone.
pub struct Bridge<S, B> {
    hub: LightHub<S>,
    bus: Arc<B>,
    topics: Arc<TopicScheme>,
}

impl<S, B> Clone for Bridge<S, B> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            bus: Arc::clone(&self.bus),
            topics: Arc::clone(&self.topics),
        }
    }
}

impl<S: LightService, B: BusClient> Bridge<S, B> {
    pub fn new(hub: LightHub<S>, bus: Arc<B>, topics: TopicScheme) -> Self {
        Self {
            hub,
            bus,
            topics: Arc::new(topics),
        }
    }

    /// Filters the bridge listens on: light commands and Home Assistant status.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![self.topics.command_filter(), self.topics.status_topic()]
    }

    /// Subscribe, then mirror light changes onto the bus until `cancel` fires.
    ///
    /// Individual publish failures are logged and skipped; only a failed
    /// subscription ends the loop early.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        for filter in self.subscriptions() {
            self.bus.subscribe(&filter).await?;
        }

        let mut lights = self.hub.connect(None);
        info!("bridge started");

        loop {
            let batch = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                batch = lights.next() => batch,
            };
            let Some(batch) = batch else { break };

            for change in batch.iter() {
                if let Err(e) = self.publish_change(change).await {
                    warn!(device = %change.id(), error = %e, "failed to publish light change");
                }
            }
        }

        info!("bridge stopped");
        Ok(())
    }

    /// Publish the bus side of one change.
    pub async fn publish_change(&self, change: &Change) -> Result<(), BridgeError> {
        match change {
            Change::Added(light) => {
                self.announce(light.id).await?;
                self.publish_state(light).await
            }
            Change::Updated(light) => self.publish_state(light).await,
            Change::Removed(id) => {
                debug!(device = %id, "retracting light");
                self.bus
                    .publish(&self.topics.config_topic(*id), Vec::new(), true)
                    .await
            }
        }
    }

    /// Process one inbound message, acknowledging it once handled.
    ///
    /// Messages that cannot be interpreted are acknowledged and dropped.
    /// When the cloud call or the echo fails the error is returned and the
    /// message stays unacknowledged. The MQTT session is clean, so the broker
    /// redelivers it only if the connection survives; a reconnect discards
    /// it and Home Assistant has to send the command again.
    pub async fn handle(&self, delivery: B::Delivery) -> Result<(), BridgeError> {
        let topic = delivery.topic();

        if topic == self.topics.status_topic() {
            let count = self.republish_all().await?;
            info!(count, "home assistant status received; lights republished");
        } else if let Some(id) = self.topics.parse_command_topic(topic) {
            match serde_json::from_slice::<StatePayload>(delivery.payload()) {
                Ok(command) => self.execute(id, command).await?,
                Err(e) => debug!(topic, error = %e, "dropping command with unreadable payload"),
            }
        } else {
            debug!(topic, "dropping message on unrecognised topic");
        }

        self.bus.ack(&delivery).await
    }

    /// Announce every known light again and publish its state.
    ///
    /// Returns the number of lights republished. Before the first completed
    /// poll there is nothing to replay, and that poll announces every light
    /// through the change stream anyway.
    pub async fn republish_all(&self) -> Result<usize, BridgeError> {
        let Some(lights) = self.hub.current() else {
            debug!("no completed poll yet; nothing to republish");
            return Ok(0);
        };
        for light in &lights {
            self.announce(light.id).await?;
            self.publish_state(light).await?;
        }
        Ok(lights.len())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn execute(&self, id: DeviceId, command: StatePayload) -> Result<(), BridgeError> {
        debug!(device = %id, state = %command.state, "forwarding light command");
        self.hub.service().set_light(id, command.state).await?;

        // Optimistic: the next poll confirms (or corrects) the state.
        let echo = serde_json::to_vec(&command)?;
        self.bus
            .publish(&self.topics.echo_topic(id), echo, false)
            .await
    }

    async fn announce(&self, id: DeviceId) -> Result<(), BridgeError> {
        let payload = DiscoveryPayload::light(self.topics.object_id(id), self.topics.base_topic(id));
        let body = serde_json::to_vec(&payload)?;
        self.bus
            .publish(&self.topics.config_topic(id), body, true)
            .await
    }

    async fn publish_state(&self, light: &Light) -> Result<(), BridgeError> {
        let body = serde_json::to_vec(&StatePayload::new(light.state))?;
        self.bus
            .publish(&self.topics.state_topic(light.id), body, false)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use carrot_core::{CacheConfig, CoreError, LightState};
    use pretty_assertions::assert_eq;

    use super::*;

    // ── Test doubles ─────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Entry {
        Subscribe(String),
        Publish {
            topic: String,
            payload: String,
            retain: bool,
        },
        Ack(String),
        Command(DeviceId, LightState),
    }

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<Entry>>>);

    impl Journal {
        fn push(&self, entry: Entry) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<Entry> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeLights {
        journal: Journal,
        polls: Mutex<VecDeque<Vec<Light>>>,
        last: Mutex<Vec<Light>>,
        reject_commands: AtomicBool,
    }

    impl FakeLights {
        fn new(journal: &Journal, polls: Vec<Vec<Light>>) -> Self {
            Self {
                journal: journal.clone(),
                polls: Mutex::new(polls.into()),
                last: Mutex::new(Vec::new()),
                reject_commands: AtomicBool::new(false),
            }
        }
    }

    impl LightService for FakeLights {
        async fn login(&self) -> Result<(), CoreError> {
            Ok(())
        }

        async fn light_status(&self) -> Result<Vec<Light>, CoreError> {
            let next = self.polls.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(lights) = next {
                *last = lights;
            }
            Ok(last.clone())
        }

        async fn set_light(&self, id: DeviceId, state: LightState) -> Result<(), CoreError> {
            if self.reject_commands.load(Ordering::SeqCst) {
                return Err(CoreError::Timeout);
            }
            self.journal.push(Entry::Command(id, state));
            Ok(())
        }
    }

    struct RecordingBus {
        journal: Journal,
        failing_topic: Mutex<Option<String>>,
    }

    impl RecordingBus {
        fn fail_publishes_to(&self, topic: &str) {
            *self.failing_topic.lock().unwrap() = Some(topic.to_owned());
        }
    }

    struct TestDelivery {
        topic: String,
        payload: Vec<u8>,
    }

    impl TestDelivery {
        fn new(topic: &str, payload: &str) -> Self {
            Self {
                topic: topic.to_owned(),
                payload: payload.as_bytes().to_vec(),
            }
        }
    }

    impl Delivery for TestDelivery {
        fn topic(&self) -> &str {
            &self.topic
        }

        fn payload(&self) -> &[u8] {
            &self.payload
        }
    }

    impl BusClient for RecordingBus {
        type Delivery = TestDelivery;

        async fn publish(
            &self,
            topic: &str,
            payload: Vec<u8>,
            retain: bool,
        ) -> Result<(), BridgeError> {
            if self.failing_topic.lock().unwrap().as_deref() == Some(topic) {
                return Err(BridgeError::Bus("broker unavailable".into()));
            }
            self.journal.push(Entry::Publish {
                topic: topic.to_owned(),
                payload: String::from_utf8(payload).unwrap(),
                retain,
            });
            Ok(())
        }

        async fn subscribe(&self, filter: &str) -> Result<(), BridgeError> {
            self.journal.push(Entry::Subscribe(filter.to_owned()));
            Ok(())
        }

        async fn ack(&self, delivery: &TestDelivery) -> Result<(), BridgeError> {
            self.journal.push(Entry::Ack(delivery.topic.clone()));
            Ok(())
        }
    }

    // ── Fixtures ─────────────────────────────────────────────────────

    type TestBridge = Bridge<FakeLights, RecordingBus>;

    fn light(id: u32, state: LightState) -> Light {
        Light::new(DeviceId::new(id), state)
    }

    fn setup(journal: &Journal, polls: Vec<Vec<Light>>) -> (TestBridge, CancellationToken) {
        let cancel = CancellationToken::new();
        let service = Arc::new(FakeLights::new(journal, polls));
        let hub = LightHub::new(service, CacheConfig::default(), cancel.clone());
        let bus = Arc::new(RecordingBus {
            journal: journal.clone(),
            failing_topic: Mutex::new(None),
        });
        (Bridge::new(hub, bus, TopicScheme::default()), cancel)
    }

    async fn run_for(bridge: &TestBridge, cancel: &CancellationToken, period: Duration) {
        let task = tokio::spawn({
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            async move { bridge.run(cancel).await }
        });
        tokio::time::sleep(period).await;
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    fn subscriptions() -> Vec<Entry> {
        vec![
            Entry::Subscribe("homeassistant/light/+/set".into()),
            Entry::Subscribe("homeassistant/status".into()),
        ]
    }

    fn discovery(id: u32) -> Entry {
        Entry::Publish {
            topic: format!("homeassistant/light/carrothome{id}/config"),
            payload: format!(
                r#"{{"name":"carrothome{id}","unique_id":"carrothome{id}","~":"homeassistant/light/carrothome{id}","stat_t":"~/state","cmd_t":"~/set","schema":"json"}}"#
            ),
            retain: true,
        }
    }

    fn state(id: u32, state: &str) -> Entry {
        Entry::Publish {
            topic: format!("homeassistant/light/carrothome{id}/state"),
            payload: format!(r#"{{"state":"{state}"}}"#),
            retain: false,
        }
    }

    fn retraction(id: u32) -> Entry {
        Entry::Publish {
            topic: format!("homeassistant/light/carrothome{id}/config"),
            payload: String::new(),
            retain: true,
        }
    }

    fn echo(id: u32, state: &str) -> Entry {
        Entry::Publish {
            topic: format!("carrot/light/carrothome{id}/state"),
            payload: format!(r#"{{"state":"{state}"}}"#),
            retain: false,
        }
    }

    // ── Outbound ─────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn added_lights_are_announced_then_updates_publish_state_only() {
        let journal = Journal::default();
        let (bridge, cancel) = setup(
            &journal,
            vec![
                vec![light(1, LightState::Off), light(2, LightState::On)],
                vec![light(1, LightState::On), light(2, LightState::On)],
            ],
        );

        run_for(&bridge, &cancel, Duration::from_millis(6_500)).await;

        let mut expected = subscriptions();
        expected.extend([
            discovery(1),
            state(1, "OFF"),
            discovery(2),
            state(2, "ON"),
            state(1, "ON"),
        ]);
        assert_eq!(journal.entries(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_light_retracts_discovery_without_state() {
        let journal = Journal::default();
        let (bridge, cancel) = setup(&journal, vec![vec![light(1, LightState::Off)], vec![]]);

        run_for(&bridge, &cancel, Duration::from_millis(6_500)).await;

        let mut expected = subscriptions();
        expected.extend([discovery(1), state(1, "OFF"), retraction(1)]);
        assert_eq!(journal.entries(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_does_not_stop_the_bridge() {
        let journal = Journal::default();
        let (bridge, cancel) = setup(
            &journal,
            vec![vec![light(1, LightState::Off), light(2, LightState::On)]],
        );
        bridge
            .bus
            .fail_publishes_to("homeassistant/light/carrothome1/state");

        run_for(&bridge, &cancel, Duration::from_millis(3_500)).await;

        let mut expected = subscriptions();
        expected.extend([discovery(1), discovery(2), state(2, "ON")]);
        assert_eq!(journal.entries(), expected);
    }

    // ── Inbound commands ─────────────────────────────────────────────

    #[tokio::test]
    async fn command_is_forwarded_echoed_then_acked() {
        let journal = Journal::default();
        let (bridge, _cancel) = setup(&journal, vec![]);

        bridge
            .handle(TestDelivery::new(
                "homeassistant/light/carrothome5/set",
                r#"{"state":"ON"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(
            journal.entries(),
            vec![
                Entry::Command(DeviceId::new(5), LightState::On),
                echo(5, "ON"),
                Entry::Ack("homeassistant/light/carrothome5/set".into()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_cloud_call_leaves_command_unacknowledged() {
        let journal = Journal::default();
        let (bridge, _cancel) = setup(&journal, vec![]);
        bridge
            .hub
            .service()
            .reject_commands
            .store(true, Ordering::SeqCst);

        let result = bridge
            .handle(TestDelivery::new(
                "homeassistant/light/carrothome5/set",
                r#"{"state":"OFF"}"#,
            ))
            .await;

        assert!(matches!(result, Err(BridgeError::Core(CoreError::Timeout))));
        assert_eq!(journal.entries(), vec![]);
    }

    #[tokio::test]
    async fn failed_echo_leaves_command_unacknowledged() {
        let journal = Journal::default();
        let (bridge, _cancel) = setup(&journal, vec![]);
        bridge.bus.fail_publishes_to("carrot/light/carrothome5/state");

        let result = bridge
            .handle(TestDelivery::new(
                "homeassistant/light/carrothome5/set",
                r#"{"state":"ON"}"#,
            ))
            .await;

        assert!(result.is_err());
        assert_eq!(
            journal.entries(),
            vec![Entry::Command(DeviceId::new(5), LightState::On)]
        );
    }

    #[tokio::test]
    async fn malformed_messages_are_acked_and_dropped() {
        let journal = Journal::default();
        let (bridge, _cancel) = setup(&journal, vec![]);

        for (topic, payload) in [
            ("homeassistant/light/carrothomeabc/set", r#"{"state":"ON"}"#),
            ("homeassistant/light/carrothome5/set", "ON"),
            ("homeassistant/light/carrothome5/set", r#"{"state":"DIM"}"#),
            ("somewhere/else", "{}"),
        ] {
            bridge
                .handle(TestDelivery::new(topic, payload))
                .await
                .unwrap();
        }

        assert_eq!(
            journal.entries(),
            vec![
                Entry::Ack("homeassistant/light/carrothomeabc/set".into()),
                Entry::Ack("homeassistant/light/carrothome5/set".into()),
                Entry::Ack("homeassistant/light/carrothome5/set".into()),
                Entry::Ack("somewhere/else".into()),
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_commands_keep_their_own_ids() {
        let journal = Journal::default();
        let (bridge, _cancel) = setup(&journal, vec![]);

        let (a, b) = tokio::join!(
            bridge.handle(TestDelivery::new(
                "homeassistant/light/carrothome1/set",
                r#"{"state":"ON"}"#,
            )),
            bridge.handle(TestDelivery::new(
                "homeassistant/light/carrothome2/set",
                r#"{"state":"OFF"}"#,
            )),
        );
        a.unwrap();
        b.unwrap();

        let entries = journal.entries();
        assert!(entries.contains(&Entry::Command(DeviceId::new(1), LightState::On)));
        assert!(entries.contains(&Entry::Command(DeviceId::new(2), LightState::Off)));
        assert!(entries.contains(&echo(1, "ON")));
        assert!(entries.contains(&echo(2, "OFF")));
        assert_eq!(entries.len(), 6);
    }

    // ── Restart reconciliation ───────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn status_message_republishes_every_light_once() {
        let journal = Journal::default();
        let (bridge, cancel) = setup(&journal, vec![vec![light(3, LightState::On)]]);
        let task = tokio::spawn({
            let bridge = bridge.clone();
            let cancel = cancel.clone();
            async move { bridge.run(cancel).await }
        });
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let before = journal.entries().len();

        bridge
            .handle(TestDelivery::new("homeassistant/status", "online"))
            .await
            .unwrap();

        assert_eq!(
            journal.entries()[before..].to_vec(),
            vec![
                discovery(3),
                state(3, "ON"),
                Entry::Ack("homeassistant/status".into()),
            ]
        );

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn status_before_first_poll_is_acked_without_waiting() {
        let journal = Journal::default();
        let (bridge, _cancel) = setup(&journal, vec![vec![light(3, LightState::On)]]);

        for _ in 0..3 {
            bridge
                .handle(TestDelivery::new("homeassistant/status", "online"))
                .await
                .unwrap();
        }

        assert_eq!(
            journal.entries(),
            vec![Entry::Ack("homeassistant/status".into()); 3]
        );
        assert!(!bridge.hub.is_running(), "no engine started for the status message");
    }
}
