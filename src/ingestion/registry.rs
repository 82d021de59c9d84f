//! In-process fan-out bus: one upstream feed, many callbacks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::TransportError;

// ---

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered set of callbacks for one event type.
///
/// Dispatch runs the callbacks outside the lock, so a callback may
/// subscribe or unsubscribe without deadlocking. Removal takes effect for
/// the next event.
pub struct SubscriberRegistry<E> {
    entries: Mutex<Vec<(Uuid, Callback<E>)>>,
}

impl<E> Default for SubscriberRegistry<E> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E> SubscriberRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new entry's id and the subscriber count after insertion.
    pub fn insert(&self, callback: Callback<E>) -> (Uuid, usize) {
        let mut entries = self.entries.lock();
        let id = Uuid::new_v4();
        entries.push((id, callback));
        (id, entries.len())
    }

    /// Returns the remaining count, or `None` when `id` was not registered.
    pub fn remove(&self, id: Uuid) -> Option<usize> {
        // ---
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|(entry, _)| *entry == id)?;
        entries.remove(pos);
        Some(entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// A panicking callback does not stop delivery to the others; the first
    /// panic is reported once all callbacks have run.
    pub fn dispatch(&self, event: &E) -> Result<usize, TransportError> {
        // ---
        let callbacks: Vec<Callback<E>> =
            self.entries.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();

        let mut failure = None;
        for cb in &callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| cb(event))) {
                failure.get_or_insert_with(|| panic_message(payload.as_ref()));
            }
        }

        match failure {
            Some(msg) => Err(TransportError::SubscriberPanicked(msg)),
            None => Ok(callbacks.len()),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
