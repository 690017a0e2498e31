//! Bus client facade
//!
//! Combines the transport with the topic multiplexer and exposes the
//! subscribe / unsubscribe / publish contract the rest of the relay uses.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};

use super::{BusOp, BusTransport, ConnectionState, InboundMessage, MessageHandler, TopicMultiplexer};

/// Consumer name used by [`BusClient::subscribe`]
pub const DEFAULT_CONSUMER: &str = "default";

/// Handle to the single upstream bus connection
pub struct BusClient {
    transport: Arc<dyn BusTransport>,
    multiplexer: TopicMultiplexer,
    /// Topic -> session it was advertised in
    advertised: Mutex<HashMap<String, u64>>,
}

impl BusClient {
    pub fn new(transport: Arc<dyn BusTransport>) -> Self {
        Self {
            multiplexer: TopicMultiplexer::new(transport.clone()),
            transport,
            advertised: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn session(&self) -> u64 {
        self.transport.session()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.watch_state()
    }

    pub fn multiplexer(&self) -> &TopicMultiplexer {
        &self.multiplexer
    }

    /// Subscribe with last-write-wins handler semantics
    ///
    /// Subscribing to an already subscribed topic replaces the handler and
    /// does not create a second upstream subscription.
    pub fn subscribe(&self, topic: &str, kind: &str, handler: MessageHandler) -> bool {
        self.register(topic, kind, DEFAULT_CONSUMER, handler)
    }

    /// Subscribe on behalf of a named consumer
    pub fn register(
        &self,
        topic: &str,
        kind: &str,
        consumer: &str,
        handler: MessageHandler,
    ) -> bool {
        debug!(
            topic,
            kind,
            consumer,
            connected = self.is_connected(),
            "Subscribe requested"
        );
        self.multiplexer.register(topic, kind, consumer, handler)
    }

    pub fn deregister(&self, topic: &str, consumer: &str) -> bool {
        self.multiplexer.deregister(topic, consumer)
    }

    /// Remove both the upstream subscription and every local handler
    pub fn unsubscribe(&self, topic: &str) -> bool {
        self.multiplexer.unsubscribe(topic)
    }

    /// Fire-and-forget publish
    ///
    /// The topic is advertised once per bus session before its first
    /// message. Nothing is sent while disconnected.
    pub fn publish(&self, topic: &str, kind: &str, payload: Value) {
        if !self.transport.is_connected() {
            debug!(topic, "Publish dropped, bus not connected");
            return;
        }

        let session = self.transport.session();
        {
            let mut advertised = self.advertised.lock();
            if advertised.get(topic) != Some(&session) {
                self.transport.send(BusOp::advertise(topic, kind));
                advertised.insert(topic.to_string(), session);
            }
        }

        debug!(topic, kind, "Publishing message");
        self.transport.send(BusOp::publish(topic, payload));
    }

    /// Route one inbound message to its handlers
    pub fn dispatch(&self, message: &InboundMessage) -> usize {
        self.multiplexer.dispatch(&message.topic, &message.payload)
    }

    /// Drain inbound messages until the transport side closes the channel
    #[instrument(skip(self, inbound))]
    pub async fn run_dispatch(&self, mut inbound: mpsc::Receiver<InboundMessage>) {
        info!("Bus dispatcher started");

        while let Some(message) = inbound.recv().await {
            self.dispatch(&message);
        }

        info!("Bus dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FakeTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_advertises_once_per_session() {
        let transport = Arc::new(FakeTransport::connected());
        let client = BusClient::new(transport.clone());

        client.publish("/cmd", "std_msgs/msg/String", json!({"data": "a"}));
        client.publish("/cmd", "std_msgs/msg/String", json!({"data": "b"}));
        assert_eq!(transport.count("advertise"), 1);
        assert_eq!(transport.count("publish"), 2);

        transport.disconnect();
        transport.connect();
        client.publish("/cmd", "std_msgs/msg/String", json!({"data": "c"}));
        assert_eq!(transport.count("advertise"), 2);
        assert_eq!(transport.count("publish"), 3);
    }

    #[test]
    fn test_publish_while_disconnected_sends_nothing() {
        let transport = Arc::new(FakeTransport::new());
        let client = BusClient::new(transport.clone());

        client.publish("/cmd", "std_msgs/msg/String", json!({"data": "a"}));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_subscribe_is_last_write_wins() {
        let transport = Arc::new(FakeTransport::connected());
        let client = BusClient::new(transport.clone());

        let fired = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let first = fired.clone();
        let second = fired.clone();

        client.subscribe(
            "/chatter",
            "std_msgs/msg/String",
            Arc::new(move |_: &Value| first.lock().push("A")),
        );
        client.subscribe(
            "/chatter",
            "std_msgs/msg/String",
            Arc::new(move |_: &Value| second.lock().push("B")),
        );

        client.dispatch(&InboundMessage {
            topic: "/chatter".to_string(),
            payload: json!({"data": "hello"}),
        });

        assert_eq!(transport.count("subscribe"), 1);
        assert_eq!(*fired.lock(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_run_dispatch_drains_until_closed() {
        let transport = Arc::new(FakeTransport::connected());
        let client = Arc::new(BusClient::new(transport));
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();

        client.subscribe(
            "/rosout",
            "rcl_interfaces/msg/Log",
            Arc::new(move |_: &Value| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let (tx, rx) = mpsc::channel(8);
        let dispatcher = {
            let client = client.clone();
            tokio::spawn(async move { client.run_dispatch(rx).await })
        };

        for i in 0..3 {
            tx.send(InboundMessage {
                topic: "/rosout".to_string(),
                payload: json!({"msg": i}),
            })
            .await
            .unwrap();
        }
        drop(tx);

        dispatcher.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
