//! Subscription supervisor
//!
//! Keeps a set of required subscriptions alive across bus reconnects.
//! Upstream subscriptions are assumed lost whenever the bus connection
//! drops, so every requirement is re-established once per new session.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::bus::{BusClient, MessageHandler};

/// Consumer feeding the camera distributor
pub const CAMERA_CONSUMER: &str = "camera";

/// Consumer recording client-requested topics into the ledger
pub const LEDGER_CONSUMER: &str = "ledger";

/// A subscription the relay wants to hold whenever the bus is up
#[derive(Clone)]
pub struct RequiredSubscription {
    pub topic: String,
    pub kind: String,
    pub consumer: String,
    pub handler: MessageHandler,
}

impl RequiredSubscription {
    pub fn new(
        topic: impl Into<String>,
        kind: impl Into<String>,
        consumer: impl Into<String>,
        handler: MessageHandler,
    ) -> Self {
        Self {
            topic: topic.into(),
            kind: kind.into(),
            consumer: consumer.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for RequiredSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequiredSubscription")
            .field("topic", &self.topic)
            .field("kind", &self.kind)
            .field("consumer", &self.consumer)
            .finish_non_exhaustive()
    }
}

/// Per-requirement reconciliation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    NotSubscribed,
    /// Subscribed in the given bus session
    Subscribed { session: u64 },
}

struct Entry {
    required: RequiredSubscription,
    state: SubscriptionState,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Requirements (re)subscribed in this pass
    pub subscribed: usize,
    /// Requirements marked stale because the bus went away
    pub invalidated: usize,
}

pub struct SubscriptionSupervisor {
    bus: Arc<BusClient>,
    poll_interval: Duration,
    entries: Mutex<Vec<Entry>>,
}

impl SubscriptionSupervisor {
    pub fn new(bus: Arc<BusClient>, poll_interval: Duration) -> Self {
        Self {
            bus,
            poll_interval,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Add or replace a requirement and reconcile right away
    ///
    /// Returns whether the requirement is subscribed after the call.
    pub fn require(&self, required: RequiredSubscription) -> bool {
        {
            let mut entries = self.entries.lock();
            let existing = entries.iter_mut().find(|e| {
                e.required.topic == required.topic && e.required.consumer == required.consumer
            });

            match existing {
                Some(entry) => {
                    entry.required = required.clone();
                    entry.state = SubscriptionState::NotSubscribed;
                }
                None => {
                    info!(
                        topic = %required.topic,
                        consumer = %required.consumer,
                        "Subscription required"
                    );
                    entries.push(Entry {
                        required: required.clone(),
                        state: SubscriptionState::NotSubscribed,
                    });
                }
            }
        }

        self.reconcile();
        self.is_subscribed(&required.topic, &required.consumer)
    }

    /// Drop a requirement and its local handler
    ///
    /// The upstream subscription closes once no consumer is left on the
    /// topic. Returns whether the requirement existed.
    pub fn release(&self, topic: &str, consumer: &str) -> bool {
        // Entries stay locked through the deregister (entries before topics)
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| !(e.required.topic == topic && e.required.consumer == consumer));
        let removed = before != entries.len();

        if removed {
            self.bus.deregister(topic, consumer);
            info!(topic, consumer, "Subscription released");
        }
        removed
    }

    /// Bring every requirement in line with the current bus state
    pub fn reconcile(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut entries = self.entries.lock();

        if !self.bus.is_connected() {
            for entry in entries.iter_mut() {
                if let SubscriptionState::Subscribed { session } = entry.state {
                    debug!(
                        topic = %entry.required.topic,
                        session,
                        "Bus down, subscription marked stale"
                    );
                    entry.state = SubscriptionState::NotSubscribed;
                    report.invalidated += 1;
                }
            }
            return report;
        }

        let current = self.bus.session();
        for entry in entries.iter_mut() {
            if entry.state == (SubscriptionState::Subscribed { session: current }) {
                continue;
            }

            if let SubscriptionState::Subscribed { session } = entry.state {
                debug!(
                    topic = %entry.required.topic,
                    stale = session,
                    current,
                    "Bus session changed since last subscribe"
                );
                report.invalidated += 1;
            }

            let required = &entry.required;
            self.bus.register(
                &required.topic,
                &required.kind,
                &required.consumer,
                required.handler.clone(),
            );
            entry.state = SubscriptionState::Subscribed { session: current };
            report.subscribed += 1;

            info!(
                topic = %required.topic,
                consumer = %required.consumer,
                session = current,
                "Subscription established"
            );
        }

        report
    }

    pub fn state(&self, topic: &str, consumer: &str) -> Option<SubscriptionState> {
        self.entries
            .lock()
            .iter()
            .find(|e| e.required.topic == topic && e.required.consumer == consumer)
            .map(|e| e.state)
    }

    pub fn is_subscribed(&self, topic: &str, consumer: &str) -> bool {
        matches!(
            self.state(topic, consumer),
            Some(SubscriptionState::Subscribed { .. })
        )
    }

    /// Topics with at least one requirement
    pub fn required_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .entries
            .lock()
            .iter()
            .map(|e| e.required.topic.clone())
            .collect();
        topics.sort();
        topics.dedup();
        topics
    }

    /// Reconcile on a fixed cadence and on every connection-state change
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting subscription supervisor (poll every {}ms)",
            self.poll_interval.as_millis()
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut state_rx = self.bus.watch_state();
        let mut watching = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconcile();
                }
                changed = state_rx.changed(), if watching => {
                    if changed.is_err() {
                        debug!("Bus state channel closed, falling back to polling");
                        watching = false;
                        continue;
                    }
                    let state = *state_rx.borrow_and_update();
                    debug!(%state, "Bus state changed");
                    self.reconcile();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Subscription supervisor shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FakeTransport;
    use crate::bus::BusOp;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<FakeTransport>, Arc<BusClient>, SubscriptionSupervisor) {
        let transport = Arc::new(FakeTransport::new());
        let bus = Arc::new(BusClient::new(transport.clone()));
        let supervisor = SubscriptionSupervisor::new(bus.clone(), Duration::from_millis(20));
        (transport, bus, supervisor)
    }

    fn camera(counter: &Arc<AtomicUsize>) -> RequiredSubscription {
        let counter = counter.clone();
        RequiredSubscription::new(
            "/camera/color/image_raw/compressed",
            "sensor_msgs/msg/CompressedImage",
            "camera",
            Arc::new(move |_: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_no_subscribe_while_disconnected() {
        let (transport, _bus, supervisor) = setup();
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(!supervisor.require(camera(&counter)));
        for _ in 0..5 {
            assert_eq!(supervisor.reconcile(), ReconcileReport::default());
        }
        assert!(transport.sent().is_empty());
        assert_eq!(
            supervisor.state("/camera/color/image_raw/compressed", "camera"),
            Some(SubscriptionState::NotSubscribed)
        );
    }

    #[test]
    fn test_resubscribes_once_per_reconnect() {
        let (transport, _bus, supervisor) = setup();
        let counter = Arc::new(AtomicUsize::new(0));
        supervisor.require(camera(&counter));

        transport.connect();
        supervisor.reconcile();
        supervisor.reconcile();
        assert_eq!(transport.count("subscribe"), 1);

        transport.disconnect();
        let report = supervisor.reconcile();
        assert_eq!(report.invalidated, 1);
        supervisor.reconcile();
        assert_eq!(transport.count("subscribe"), 1);

        transport.connect();
        let report = supervisor.reconcile();
        assert_eq!(report.subscribed, 1);
        supervisor.reconcile();
        assert_eq!(transport.count("subscribe"), 2);
        assert_eq!(
            supervisor.state("/camera/color/image_raw/compressed", "camera"),
            Some(SubscriptionState::Subscribed { session: 2 })
        );
    }

    #[test]
    fn test_flap_between_polls_is_detected_by_session() {
        let (transport, _bus, supervisor) = setup();
        let counter = Arc::new(AtomicUsize::new(0));
        transport.connect();
        supervisor.require(camera(&counter));
        assert_eq!(transport.count("subscribe"), 1);

        // Disconnect and reconnect without a poll in between.
        transport.disconnect();
        transport.connect();

        let report = supervisor.reconcile();
        assert_eq!(report, ReconcileReport { subscribed: 1, invalidated: 1 });
        assert_eq!(transport.count("subscribe"), 2);
    }

    #[test]
    fn test_required_handler_receives_messages() {
        let (transport, bus, supervisor) = setup();
        let counter = Arc::new(AtomicUsize::new(0));
        transport.connect();
        supervisor.require(camera(&counter));

        bus.dispatch(&crate::bus::InboundMessage {
            topic: "/camera/color/image_raw/compressed".to_string(),
            payload: json!({"data": "AQID"}),
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_unsubscribes_last_consumer() {
        let (transport, bus, supervisor) = setup();
        transport.connect();

        let noop: MessageHandler = Arc::new(|_: &Value| {});
        supervisor.require(RequiredSubscription::new(
            "/rosout",
            "rcl_interfaces/msg/Log",
            "ledger",
            noop,
        ));
        assert_eq!(supervisor.required_topics(), vec!["/rosout".to_string()]);

        assert!(supervisor.release("/rosout", "ledger"));
        assert!(!supervisor.release("/rosout", "ledger"));
        assert!(supervisor.required_topics().is_empty());
        assert_eq!(bus.multiplexer().consumer_count("/rosout"), 0);
        assert!(matches!(
            transport.sent().last(),
            Some(BusOp::Unsubscribe { topic, .. }) if topic == "/rosout"
        ));
    }

    #[test]
    fn test_release_racing_require_keeps_handler() {
        let transport = Arc::new(FakeTransport::connected());
        let bus = Arc::new(BusClient::new(transport.clone()));
        let supervisor = Arc::new(SubscriptionSupervisor::new(
            bus.clone(),
            Duration::from_secs(3600),
        ));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let supervisor = supervisor.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        supervisor.release("/rosout", "ledger");
                        let noop: MessageHandler = Arc::new(|_: &Value| {});
                        supervisor.require(RequiredSubscription::new(
                            "/rosout",
                            "rcl_interfaces/msg/Log",
                            "ledger",
                            noop,
                        ));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(supervisor.is_subscribed("/rosout", "ledger"));
        assert_eq!(bus.multiplexer().consumer_count("/rosout"), 1);
    }

    #[tokio::test]
    async fn test_run_reacts_to_state_changes() {
        let transport = Arc::new(FakeTransport::new());
        let supervisor = Arc::new(SubscriptionSupervisor::new(
            Arc::new(BusClient::new(transport.clone())),
            Duration::from_secs(3600),
        ));

        let counter = Arc::new(AtomicUsize::new(0));
        supervisor.require(camera(&counter));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.run(shutdown_rx).await })
        };

        transport.connect();
        tokio::time::timeout(Duration::from_secs(2), async {
            while transport.count("subscribe") == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(transport.count("subscribe"), 1);
    }
}
