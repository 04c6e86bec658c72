use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// Single-threaded event source with scoped subscriptions.
///
/// Hosts push events (selection changes, resizes, location reports) into a
/// signal; views subscribe and keep the returned [`Subscription`]. Dropping
/// the subscription unsubscribes, so a view cannot outlive its listeners.
pub struct Signal<T> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let mut slots = self.slots.borrow_mut();
        let id = slots.next_id;
        slots.next_id += 1;
        let listener: Listener<T> = Rc::new(RefCell::new(listener));
        slots.listeners.push((id, listener));

        let weak: Weak<RefCell<Slots<T>>> = Rc::downgrade(&self.slots);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Deliver `event` to every listener registered when emission starts.
    ///
    /// Listeners may subscribe or unsubscribe while being called; a listener
    /// that is already running is skipped instead of re-entered.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = self.slots.borrow().listeners.clone();
        for (id, listener) in snapshot {
            let still_registered = self
                .slots
                .borrow()
                .listeners
                .iter()
                .any(|(lid, _)| *lid == id);
            if !still_registered {
                continue;
            }
            if let Ok(mut callback) = listener.try_borrow_mut() {
                (&mut *callback)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.slots.borrow().listeners.len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Live registration on a [`Signal`]; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dropping_subscription_stops_delivery() {
        let signal = Signal::<u32>::new();
        let seen = Rc::new(Cell::new(0));

        let sink = seen.clone();
        let sub = signal.subscribe(move |v| sink.set(sink.get() + v));
        signal.emit(&2);
        drop(sub);
        signal.emit(&5);

        assert_eq!(seen.get(), 2);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_signal_is_harmless() {
        let signal = Signal::<()>::new();
        let sub = signal.subscribe(|_| {});
        drop(signal);
        sub.cancel();
    }

    #[test]
    fn listener_removed_mid_emit_is_not_called() {
        let signal = Signal::<()>::new();
        let calls = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let v = victim.clone();
        let _first = signal.subscribe(move |_| {
            v.borrow_mut().take();
        });
        let c = calls.clone();
        *victim.borrow_mut() = Some(signal.subscribe(move |_| c.set(c.get() + 1)));

        signal.emit(&());
        assert_eq!(calls.get(), 0);
    }
}
