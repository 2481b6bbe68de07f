use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::subscription::{Subscription, SubscriptionId};
use crate::EmitError;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Listener {
    id: SubscriptionId,
    handler: Handler,
}

/// Handler table shared between the channel and its subscriptions.
#[derive(Default)]
pub(crate) struct Registry {
    topics: Mutex<HashMap<String, Vec<Listener>>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Listener>>> {
        // Handlers never run under this lock, so a poisoned table is still consistent.
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove(&self, topic: &str, id: SubscriptionId) {
        let mut topics = self.lock();
        if let Some(listeners) = topics.get_mut(topic) {
            listeners.retain(|l| l.id != id);
            if listeners.is_empty() {
                topics.remove(topic);
            }
        }
        log::trace!("Unsubscribed {} from '{}'", id, topic);
    }
}

/// Publish/subscribe hub keyed by topic name.
///
/// Cloning is cheap and every clone refers to the same handler table.
/// Delivery is synchronous: [`EventChannel::emit`] invokes each handler on
/// the caller's thread, after the table lock has been released, so handlers
/// may emit further events or drop subscriptions.
#[derive(Clone, Default)]
pub struct EventChannel {
    registry: Arc<Registry>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `payload` and hand it to every listener of `topic`.
    ///
    /// Returns the number of handlers invoked (zero when nobody listens).
    pub fn emit<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) -> Result<usize, EmitError> {
        let value = serde_json::to_value(payload).map_err(|source| EmitError::Serialize {
            topic: topic.to_string(),
            source,
        })?;

        let handlers: Vec<Handler> = self
            .registry
            .lock()
            .get(topic)
            .map(|listeners| listeners.iter().map(|l| l.handler.clone()).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(&value);
        }

        Ok(handlers.len())
    }

    /// Register `handler` for `topic`, decoding each payload into `T`.
    ///
    /// Payloads that do not decode are logged and skipped.
    pub fn listen<T, F>(&self, topic: &str, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let topic_name = topic.to_string();

        let decode_topic = topic_name.clone();
        let handler: Handler = Arc::new(move |value: &Value| {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(payload) => handler(payload),
                Err(e) => log::warn!("Dropping undecodable '{}' event: {}", decode_topic, e),
            }
        });

        self.registry
            .lock()
            .entry(topic_name.clone())
            .or_default()
            .push(Listener { id, handler });

        log::trace!("Subscribed {} to '{}'", id, topic_name);

        Subscription::new(id, topic_name, Arc::downgrade(&self.registry))
    }

    /// Number of handlers currently registered for `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.registry.lock().get(topic).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<String> = self.registry.lock().keys().cloned().collect();
        f.debug_struct("EventChannel").field("topics", &topics).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Event;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Ping {
        seq: u32,
    }

    impl Event for Ping {
        const NAME: &'static str = "ping";
    }

    #[test]
    fn test_emit_reaches_listener() {
        let channel = EventChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _sub = Ping::listen(&channel, move |p| sink.lock().unwrap().push(p.seq));

        assert_eq!(Ping { seq: 1 }.emit(&channel).unwrap(), 1);
        assert_eq!(Ping { seq: 2 }.emit(&channel).unwrap(), 1);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let channel = EventChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let sub = Ping::listen(&channel, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(channel.listener_count(Ping::NAME), 1);

        sub.unsubscribe();
        assert_eq!(channel.listener_count(Ping::NAME), 0);
        assert_eq!(Ping { seq: 1 }.emit(&channel).unwrap(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_topics_are_isolated() {
        let channel = EventChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let _sub = channel.listen::<Value, _>("other", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Ping { seq: 7 }.emit(&channel).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_undecodable_payload_is_skipped() {
        let channel = EventChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let _sub = Ping::listen(&channel, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Handler is invoked at the channel level but never sees a bad payload
        let invoked = channel.emit(Ping::NAME, &serde_json::json!({ "seq": "nope" })).unwrap();
        assert_eq!(invoked, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_emit_reentrantly() {
        let channel = EventChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner = channel.clone();
        let _relay = Ping::listen(&channel, move |p| {
            if p.seq == 0 {
                inner.emit("relayed", &p.seq).unwrap();
            }
        });

        let counter = hits.clone();
        let _sink = channel.listen::<u32, _>("relayed", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Ping { seq: 0 }.emit(&channel).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_channel_is_harmless() {
        let channel = EventChannel::new();
        let sub = Ping::listen(&channel, |_| {});
        drop(channel);
        drop(sub);
    }
}
