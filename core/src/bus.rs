//! Constructed publish/subscribe dispatcher for outbound [`Event`] values.

use std::collections::BTreeMap;
use std::fmt;

use crate::{Event, Topic};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Box<dyn FnMut(&Event)>,
}

/// Topic-keyed dispatcher delivering events to handlers in subscription order.
#[derive(Default)]
pub struct EventBus {
    topics: BTreeMap<Topic, Vec<Subscription>>,
    next_id: u64,
}

impl EventBus {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for every event published on `topic`.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.topics.entry(topic).or_default().push(Subscription {
            id,
            handler: Box::new(handler),
        });
        id
    }

    /// Removes a handler. Returns `false` when the handle is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subscriptions in self.topics.values_mut() {
            if let Some(index) = subscriptions.iter().position(|entry| entry.id == id) {
                let _ = subscriptions.remove(index);
                return true;
            }
        }
        false
    }

    /// Delivers the event to every handler of its topic.
    pub fn publish(&mut self, event: &Event) {
        let Some(subscriptions) = self.topics.get_mut(&event.topic()) else {
            return;
        };
        for subscription in subscriptions.iter_mut() {
            (subscription.handler)(event);
        }
    }

    /// Number of handlers registered on the topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.get(&topic).map_or(0, Vec::len)
    }

    /// Drops every handler.
    pub fn clear(&mut self) {
        self.topics.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&'static str, usize> = self
            .topics
            .iter()
            .map(|(topic, subscriptions)| (topic.name(), subscriptions.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .field("next_id", &self.next_id)
            .finish()
    }
}
