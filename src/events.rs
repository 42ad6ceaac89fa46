//! "Player ready" notifications
//!
//! Components that need a player (captions, deep-link jumps) subscribe
//! here instead of knowing who creates players. A subscriber that arrives
//! after a player became ready still gets told about it.

use std::collections::HashSet;
use std::fmt;

use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerReady {
    pub player_id: String,
}

impl PlayerReady {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
        }
    }
}

type Subscriber = Box<dyn FnMut(&PlayerReady)>;

#[derive(Default)]
pub struct ReadyBus {
    published: Vec<PlayerReady>,
    ready: HashSet<String>,
    subscribers: Vec<Subscriber>,
}

impl ReadyBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber`. Every event published so far is replayed to
    /// it before this returns.
    pub fn subscribe<F>(&mut self, mut subscriber: F)
    where
        F: FnMut(&PlayerReady) + 'static,
    {
        for event in &self.published {
            subscriber(event);
        }
        self.subscribers.push(Box::new(subscriber));
    }

    /// Deliver to subscribers in the order they subscribed. A player that
    /// is published again is delivered again but replayed only once.
    pub fn publish(&mut self, event: PlayerReady) {
        trace!(player = %event.player_id, subscribers = self.subscribers.len(), "player ready");
        for subscriber in self.subscribers.iter_mut() {
            subscriber(&event);
        }
        if self.ready.insert(event.player_id.clone()) {
            self.published.push(event);
        }
    }

    pub fn is_ready(&self, player_id: &str) -> bool {
        self.ready.contains(player_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Forget published events and subscribers.
    pub fn reset(&mut self) {
        self.published.clear();
        self.ready.clear();
        self.subscribers.clear();
    }
}

impl fmt::Debug for ReadyBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyBus")
            .field("published", &self.published)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&PlayerReady) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |ev: &PlayerReady| sink.borrow_mut().push(ev.player_id.clone()))
    }

    #[test]
    fn delivers_to_all_subscribers() {
        let mut bus = ReadyBus::new();
        let (a, sub_a) = recorder();
        let (b, sub_b) = recorder();
        bus.subscribe(sub_a);
        bus.subscribe(sub_b);

        bus.publish(PlayerReady::new("intro"));

        assert_eq!(*a.borrow(), vec!["intro"]);
        assert_eq!(*b.borrow(), vec!["intro"]);
        assert!(bus.is_ready("intro"));
        assert!(!bus.is_ready("outro"));
    }

    #[test]
    fn late_subscriber_gets_replay() {
        let mut bus = ReadyBus::new();
        bus.publish(PlayerReady::new("first"));
        bus.publish(PlayerReady::new("second"));

        let (seen, sub) = recorder();
        bus.subscribe(sub);
        assert_eq!(*seen.borrow(), vec!["first", "second"]);

        bus.publish(PlayerReady::new("third"));
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn republished_player_is_replayed_once() {
        let mut bus = ReadyBus::new();
        let (early, sub) = recorder();
        bus.subscribe(sub);
        bus.publish(PlayerReady::new("intro"));
        bus.publish(PlayerReady::new("intro"));
        assert_eq!(*early.borrow(), vec!["intro", "intro"]);

        let (late, sub) = recorder();
        bus.subscribe(sub);
        assert_eq!(*late.borrow(), vec!["intro"]);
    }

    #[test]
    fn reset_forgets_everything() {
        let mut bus = ReadyBus::new();
        let (_, sub) = recorder();
        bus.subscribe(sub);
        bus.publish(PlayerReady::new("x"));
        bus.reset();
        assert!(!bus.is_ready("x"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
