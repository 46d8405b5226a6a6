//! # Duplicate request suppression
//!
//! At most one live order may exist per (customer, token, network). The guard is an in-process map with a genuine
//! check-and-set: [`DuplicateGuard::reserve`] either claims the key for a new order id or returns the id of the order
//! that already holds it. Entries lapse with the order's expiry window, and are released early when their order fails
//! to be created or reaches a terminal state.
//!
//! The map is local to one process. Running several engine instances requires a shared store behind the same
//! reserve/release contract.
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use log::*;

use crate::db_types::{CustomerIdentity, Network, Order, OrderId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardKey {
    pub customer: CustomerIdentity,
    pub token: String,
    pub network: Network,
}

impl GuardKey {
    pub fn new(customer: CustomerIdentity, token: &str, network: Network) -> Self {
        Self { customer, token: token.trim().to_uppercase(), network }
    }

    pub fn for_order(order: &Order) -> Self {
        Self::new(order.customer_id.clone(), &order.target_token, order.target_network)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardEntry {
    pub order_id: OrderId,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DuplicateGuard {
    entries: DashMap<GuardKey, GuardEntry>,
}

impl DuplicateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` for `order_id` until `expires_at`.
    ///
    /// If a live entry for the key exists, nothing is written and the existing order id is returned as the error.
    pub fn reserve(
        &self,
        key: GuardKey,
        order_id: OrderId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), OrderId> {
        let entry = GuardEntry { order_id, reserved_at: now, expires_at };
        match self.entries.entry(key) {
            Entry::Occupied(mut existing) => {
                if existing.get().expires_at > now {
                    let holder = existing.get().order_id.clone();
                    debug!("🛡️ {} is a duplicate of live order {holder}", entry.order_id);
                    return Err(holder);
                }
                trace!("🛡️ Replacing lapsed reservation for {}", existing.get().order_id);
                existing.insert(entry);
                Ok(())
            },
            Entry::Vacant(slot) => {
                trace!("🛡️ Reserved slot for {}", entry.order_id);
                slot.insert(entry);
                Ok(())
            },
        }
    }

    /// Releases `key` if, and only if, it is still held by `order_id`.
    pub fn release(&self, key: &GuardKey, order_id: &OrderId) -> bool {
        let removed = self.entries.remove_if(key, |_, e| &e.order_id == order_id).is_some();
        if removed {
            trace!("🛡️ Released reservation held by {order_id}");
        }
        removed
    }

    pub fn release_for_order(&self, order: &Order) -> bool {
        self.release(&GuardKey::for_order(order), &order.order_id)
    }

    /// The order currently holding `key`, if its reservation is live.
    pub fn holder(&self, key: &GuardKey, now: DateTime<Utc>) -> Option<OrderId> {
        self.entries.get(key).filter(|e| e.expires_at > now).map(|e| e.order_id.clone())
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("🛡️ Purged {purged} lapsed reservations");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
