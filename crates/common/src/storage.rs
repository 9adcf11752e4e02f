//! Session-scoped key-value storage abstraction.
//!
//! The host environment owns the backing store (browser session storage,
//! an edge KV namespace, ...). The core only needs string reads and writes;
//! keys are namespaced by customer or `customer_bidder`.

use std::cell::RefCell;
use std::collections::HashMap;

use error_stack::Report;

use crate::error::RtdError;

/// Session storage consumed by the receptivity cache.
pub trait SessionStorage {
    /// Retrieve the raw value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store rejects the write (quota,
    /// storage disabled by the user, ...).
    fn set_item(&self, key: &str, value: &str) -> Result<(), Report<RtdError>>;
}

/// In-memory [`SessionStorage`] that lives as long as the value itself.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored item, as the host does when the session ends.
    pub fn clear(&self) {
        self.items.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Report<RtdError>> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_returns_value() {
        let storage = MemorySessionStorage::new();
        storage.set_item("CUSTOMER", "value").expect("write should succeed");

        assert_eq!(storage.get_item("CUSTOMER").as_deref(), Some("value"));
        assert_eq!(storage.get_item("OTHER"), None);
    }

    #[test]
    fn set_overwrites_and_clear_empties() {
        let storage = MemorySessionStorage::new();
        storage.set_item("k", "first").expect("write should succeed");
        storage.set_item("k", "second").expect("write should succeed");

        assert_eq!(storage.get_item("k").as_deref(), Some("second"));
        assert_eq!(storage.len(), 1);

        storage.clear();
        assert!(storage.is_empty());
    }
}
