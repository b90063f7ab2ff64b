//! Per-session mutual exclusion
//!
//! Mutating actions on one session must not interleave, but different
//! sessions proceed independently. The registry hands out RAII leases
//! keyed by session; a second acquire on a held key fails immediately
//! instead of queueing, so the loser can report a concurrency conflict.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::domain::SessionKey;

/// Hands out at most one lease per session key
#[derive(Clone, Default)]
pub struct LeaseRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lease for a session. Fails fast when another
    /// operation already holds it.
    pub fn acquire(&self, key: &SessionKey) -> Option<Lease> {
        let tag = key.to_string();
        let mut held = self.held.lock().ok()?;
        if !held.insert(tag.clone()) {
            debug!(key = %tag, "acquire: lease already held");
            return None;
        }
        debug!(key = %tag, "acquire: lease taken");
        Some(Lease {
            registry: Arc::clone(&self.held),
            tag,
        })
    }
}

/// Held lease; dropping it releases the session
pub struct Lease {
    registry: Arc<Mutex<HashSet<String>>>,
    tag: String,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Ok(mut held) = self.registry.lock() {
            held.remove(&self.tag);
            debug!(key = %self.tag, "drop: lease released");
        }
    }
}
