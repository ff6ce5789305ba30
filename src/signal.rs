//! A small observable value cell.
//!
//! `Signal<T>` owns a value, counts how many times it has been replaced and
//! calls registered listeners synchronously after every change. Consumers
//! that derive data from a signal compare [`Signal::version`] against the
//! version they last saw instead of subscribing.

use std::fmt;

/// Handle returned by [`Signal::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T)>;

pub struct Signal<T> {
    value: T,
    version: u64,
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0, next_id: 0, listeners: Vec::new() }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Incremented on every `set`/`update`, starting at zero.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the value and notify listeners.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.changed();
    }

    /// Mutate the value in place and notify listeners.
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        f(&mut self.value);
        self.changed();
    }

    /// Register a listener. It is not called with the current value.
    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn changed(&mut self) {
        self.version += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.value);
        }
    }
}

impl<T: Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &self.value)
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
