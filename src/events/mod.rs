//! In-process synchronous publish/subscribe.
//!
//! The bus is a cheap cloneable handle; every component that publishes gets
//! its own clone at construction time. Delivery is synchronous and in
//! subscription order.

pub mod payload;
pub mod topic;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

pub use payload::{BattleEvent, CommitFailure, EntityStatus};
pub use topic::Topic;

type Listener = Rc<RefCell<Box<dyn FnMut(&BattleEvent)>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every topic.
    topic: Option<Topic>,
    listener: Listener,
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Rc<RefCell<Vec<Subscription>>>,
    next_id: Rc<Cell<u64>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, listener: F) -> SubscriptionId
    where
        F: FnMut(&BattleEvent) + 'static,
    {
        self.register(Some(topic), Box::new(listener))
    }

    /// Subscribe to every topic (loggers, recorders).
    pub fn subscribe_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: FnMut(&BattleEvent) + 'static,
    {
        self.register(None, Box::new(listener))
    }

    fn register(&self, topic: Option<Topic>, listener: Box<dyn FnMut(&BattleEvent)>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            topic,
            listener: Rc::new(RefCell::new(listener)),
        });
        id
    }

    /// Returns `false` when the id was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|sub| sub.id != id);
        subscriptions.len() != before
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.topic.map_or(true, |t| t == topic))
            .count()
    }

    pub fn emit(&self, event: BattleEvent) {
        let topic = event.topic();
        // Snapshot first so listeners may subscribe, unsubscribe or emit.
        let listeners: Vec<Listener> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.topic.map_or(true, |t| t == topic))
            .map(|sub| Rc::clone(&sub.listener))
            .collect();

        for listener in listeners {
            match listener.try_borrow_mut() {
                Ok(mut callback) => (*callback)(&event),
                Err(_) => warn!(%topic, "skipping re-entrant delivery to a running listener"),
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Collects every event published on a bus, in order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<BattleEvent>>>,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.events);
        bus.subscribe_all(move |event| sink.borrow_mut().push(event.clone()));
        recorder
    }

    pub fn events(&self) -> Vec<BattleEvent> {
        self.events.borrow().clone()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.events.borrow().iter().map(BattleEvent::topic).collect()
    }

    pub fn count(&self, topic: Topic) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.topic() == topic)
            .count()
    }

    /// Text of every `BATTLE_LOG` line received so far.
    pub fn log_lines(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                BattleEvent::BattleLog { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
