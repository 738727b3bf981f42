//! Single-kind synchronous publish/subscribe.
//!
//! Components never hold references to each other; everything that crosses a
//! component boundary goes through an [`EventChannel`]. Delivery is
//! synchronous and in registration order, with no buffering or replay: a
//! subscriber registered after a publication never sees that event.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`EventChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Handler<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(Subscription, Handler<E>)>,
}

/// Cheaply clonable channel; clones share one subscriber registry.
pub struct EventChannel<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<E> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        let subscription = Subscription(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .push((subscription, Rc::new(RefCell::new(handler))));
        subscription
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut registry = self.registry.borrow_mut();
        let before = registry.handlers.len();
        registry.handlers.retain(|(id, _)| *id != subscription);
        registry.handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }

    /// Delivers `event` to every current subscriber before returning.
    ///
    /// The subscriber list is snapshotted first, so a handler subscribed
    /// during delivery waits for the next event. A handler unsubscribed by an
    /// earlier handler of the same delivery is not called. A handler that is
    /// already running (a re-entrant publish from inside itself) is skipped
    /// for the nested event.
    pub fn publish(&self, event: &E) -> usize {
        let snapshot = self
            .registry
            .borrow()
            .handlers
            .iter()
            .map(|(id, handler)| (*id, Rc::clone(handler)))
            .collect::<Vec<_>>();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            if let Ok(mut handler) = handler.try_borrow_mut() {
                (&mut *handler)(event);
                delivered += 1;
            }
        }
        delivered
    }

    fn is_subscribed(&self, subscription: Subscription) -> bool {
        self.registry
            .borrow()
            .handlers
            .iter()
            .any(|(id, _)| *id == subscription)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{EventChannel, Subscription};

    #[test]
    fn delivers_in_registration_order() {
        let channel = EventChannel::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            channel.subscribe(move |value: &u32| log.borrow_mut().push((name, *value)));
        }

        assert_eq!(channel.publish(&7), 3);
        assert_eq!(
            *log.borrow(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let channel = EventChannel::<u32>::new();
        channel.publish(&1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        channel.subscribe(move |value: &u32| sink.borrow_mut().push(*value));
        channel.publish(&2);

        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let channel = EventChannel::<()>::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = channel.subscribe(move |_| *counter.borrow_mut() += 1);

        assert!(channel.unsubscribe(subscription));
        assert!(!channel.unsubscribe(subscription));
        channel.publish(&());

        assert_eq!(*hits.borrow(), 0);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn subscribing_during_delivery_does_not_receive_current_event() {
        let channel = EventChannel::<u32>::new();
        let late_hits = Rc::new(RefCell::new(Vec::new()));

        let inner_channel = channel.clone();
        let late_sink = Rc::clone(&late_hits);
        channel.subscribe(move |value: &u32| {
            if *value == 1 {
                let sink = Rc::clone(&late_sink);
                inner_channel.subscribe(move |value: &u32| sink.borrow_mut().push(*value));
            }
        });

        channel.publish(&1);
        channel.publish(&2);

        assert_eq!(*late_hits.borrow(), vec![2]);
    }

    #[test]
    fn handler_removed_during_delivery_is_not_called() {
        let channel = EventChannel::<u32>::new();
        let victim: Rc<Cell<Option<Subscription>>> = Rc::new(Cell::new(None));
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_channel = channel.clone();
        let target = Rc::clone(&victim);
        let first_log = Rc::clone(&log);
        channel.subscribe(move |value: &u32| {
            first_log.borrow_mut().push(("first", *value));
            if let Some(subscription) = target.take() {
                inner_channel.unsubscribe(subscription);
            }
        });
        let second_log = Rc::clone(&log);
        victim.set(Some(
            channel.subscribe(move |value: &u32| second_log.borrow_mut().push(("second", *value))),
        ));

        assert_eq!(channel.publish(&1), 1);
        assert_eq!(*log.borrow(), vec![("first", 1)]);
        assert_eq!(channel.subscriber_count(), 1);
    }
}
