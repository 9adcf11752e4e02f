//! Time-bound receptivity cache on top of session storage.
//!
//! Entries are stored as `{"exp": <epoch ms>, "rx": <receptivity>}`. Expiry
//! is only checked on read: there is no eviction, the next write for the
//! same key overwrites the stale envelope.

use std::rc::Rc;

use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::RtdError;
use crate::receptivity::Receptivity;
use crate::storage::SessionStorage;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    exp: i64,
    rx: Receptivity,
}

pub struct ReceptivityCache {
    storage: Rc<dyn SessionStorage>,
    clock: Rc<dyn Clock>,
    ttl_ms: u64,
}

impl ReceptivityCache {
    pub fn new(storage: Rc<dyn SessionStorage>, clock: Rc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            storage,
            clock,
            ttl_ms,
        }
    }

    /// Key for values shared by every ad slot of a customer.
    pub fn customer_key(customer: &str) -> String {
        customer.to_string()
    }

    /// Key for a value scoped to one bidder of a customer.
    pub fn bidder_key(customer: &str, bidder: &str) -> String {
        format!("{customer}_{bidder}")
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Read the unexpired value stored under `key`.
    ///
    /// Missing, unparseable and expired envelopes all read as `None`.
    pub fn read(&self, key: &str) -> Option<Receptivity> {
        let raw = self.storage.get_item(key)?;
        let envelope: CacheEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("Ignoring malformed cache entry '{}': {}", key, e);
                return None;
            }
        };

        if self.clock.now_ms() >= envelope.exp {
            log::debug!("Cache entry '{}' expired at {}", key, envelope.exp);
            return None;
        }

        Some(envelope.rx)
    }

    /// Store `value` under `key` for `ttl_ms` milliseconds from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be serialized or the storage
    /// rejects the write.
    pub fn write(
        &self,
        key: &str,
        value: &Receptivity,
        ttl_ms: u64,
    ) -> Result<(), Report<RtdError>> {
        let ttl = i64::try_from(ttl_ms).unwrap_or(i64::MAX);
        let envelope = CacheEnvelope {
            exp: self.clock.now_ms().saturating_add(ttl),
            rx: value.clone(),
        };

        let raw = serde_json::to_string(&envelope).change_context(RtdError::Serialization {
            message: format!("Failed to serialize cache entry '{key}'"),
        })?;

        self.storage
            .set_item(key, &raw)
            .change_context(RtdError::Storage {
                message: format!("Failed to persist cache entry '{key}'"),
            })
    }

    /// Store `value` with the configured TTL, logging instead of failing.
    pub fn store(&self, key: &str, value: &Receptivity) {
        if let Err(report) = self.write(key, value, self.ttl_ms) {
            log::warn!("Failed to cache receptivity: {:?}", report);
        }
    }
}
