//! Topic subscription multiplexer
//!
//! Maps any number of local consumers of a topic onto a single upstream
//! subscription per bus session, and routes inbound messages to them.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use super::{BusOp, BusTransport, MessageHandler};

struct TopicEntry {
    kind: String,
    /// Handlers keyed by consumer name, in registration order
    handlers: Vec<(String, MessageHandler)>,
    /// Session the upstream subscription was opened in
    upstream_session: Option<u64>,
}

/// Deduplicates upstream subscriptions and fans messages out to consumers
pub struct TopicMultiplexer {
    transport: Arc<dyn BusTransport>,
    topics: RwLock<HashMap<String, TopicEntry>>,
}

impl TopicMultiplexer {
    pub fn new(transport: Arc<dyn BusTransport>) -> Self {
        Self {
            transport,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handler` for `consumer` on `topic`
    ///
    /// A consumer that is already registered has its handler replaced in
    /// place. The upstream subscription is opened if the bus is connected and
    /// the topic has no subscription in the current session yet. Returns
    /// whether an upstream subscribe was issued.
    pub fn register(
        &self,
        topic: &str,
        kind: &str,
        consumer: &str,
        handler: MessageHandler,
    ) -> bool {
        let mut topics = self.topics.write();
        let entry = topics.entry(topic.to_string()).or_insert_with(|| TopicEntry {
            kind: kind.to_string(),
            handlers: Vec::new(),
            upstream_session: None,
        });

        if entry.kind != kind {
            debug!(topic, old = %entry.kind, new = kind, "Message kind changed");
            entry.kind = kind.to_string();
            entry.upstream_session = None;
        }

        match entry.handlers.iter_mut().find(|(name, _)| name == consumer) {
            Some(slot) => {
                debug!(topic, consumer, "Handler replaced");
                slot.1 = handler;
            }
            None => {
                entry.handlers.push((consumer.to_string(), handler));
            }
        }

        let opened = self.open_upstream(topic, entry);
        if opened {
            info!(
                topic,
                kind,
                total = topics.len(),
                "Upstream subscription opened"
            );
        }
        opened
    }

    /// Remove one consumer; closes the upstream subscription when it was the
    /// last one. Returns whether the topic was closed.
    pub fn deregister(&self, topic: &str, consumer: &str) -> bool {
        let mut topics = self.topics.write();
        let Some(entry) = topics.get_mut(topic) else {
            return false;
        };

        entry.handlers.retain(|(name, _)| name != consumer);
        if !entry.handlers.is_empty() {
            return false;
        }

        if let Some(entry) = topics.remove(topic) {
            self.close_upstream(topic, &entry);
        }
        true
    }

    /// Drop every consumer of `topic` and close the upstream subscription
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.topics.write().remove(topic);
        match removed {
            Some(entry) => {
                self.close_upstream(topic, &entry);
                info!(topic, "Unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Invoke every handler registered for `topic` exactly once
    ///
    /// Handlers run outside the table lock so they may register or
    /// deregister consumers themselves. Returns the number of handlers run.
    pub fn dispatch(&self, topic: &str, payload: &Value) -> usize {
        let handlers: Vec<MessageHandler> = match self.topics.read().get(topic) {
            Some(entry) => entry.handlers.iter().map(|(_, h)| h.clone()).collect(),
            None => {
                debug!(topic, "Message for topic without consumers dropped");
                return 0;
            }
        };

        trace!(topic, handlers = handlers.len(), "Dispatching message");
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Whether `topic` has an upstream subscription in the live session
    pub fn is_open(&self, topic: &str) -> bool {
        if !self.transport.is_connected() {
            return false;
        }
        let session = self.transport.session();
        self.topics
            .read()
            .get(topic)
            .map(|entry| entry.upstream_session == Some(session))
            .unwrap_or(false)
    }

    /// Number of consumers registered for `topic`
    pub fn consumer_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|entry| entry.handlers.len())
            .unwrap_or(0)
    }

    /// Topics with at least one consumer
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    fn open_upstream(&self, topic: &str, entry: &mut TopicEntry) -> bool {
        if !self.transport.is_connected() {
            return false;
        }

        let session = self.transport.session();
        if entry.upstream_session == Some(session) {
            return false;
        }

        self.transport.send(BusOp::subscribe(topic, &entry.kind));
        entry.upstream_session = Some(session);
        true
    }

    fn close_upstream(&self, topic: &str, entry: &TopicEntry) {
        // Subscriptions from an earlier session died with that connection.
        if self.transport.is_connected()
            && entry.upstream_session == Some(self.transport.session())
        {
            self.transport.send(BusOp::unsubscribe(topic));
        }
    }
}
