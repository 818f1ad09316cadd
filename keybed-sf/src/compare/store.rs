//! Comparison store
//!
//! Single source of truth for which items are being compared. Holds at most
//! [`MAX_COMPARE_ITEMS`] unique entries in insertion order, persists the
//! whole set after every mutation and notifies listeners synchronously.

use chrono::{DateTime, Utc};
use keybed_common::events::CompareChangeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::codec::is_valid_item_id;
use super::storage::CompareStorage;

/// Maximum number of items in the compared set
pub const MAX_COMPARE_ITEMS: usize = 4;

/// One compared item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareEntry {
    pub item_id: String,
    /// Audit only; ordering comes from position in the set
    pub added_at: DateTime<Utc>,
}

impl CompareEntry {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            added_at: keybed_common::time::now(),
        }
    }
}

/// Rejected store mutation; the set is unchanged in every case
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    /// Adding would exceed [`MAX_COMPARE_ITEMS`]
    #[error("You can compare up to {max} instruments at a time. Please remove one to add another.")]
    CapacityExceeded { max: usize },

    /// The item is already in the set
    #[error("This instrument is already in your compare list")]
    DuplicateEntry { item_id: String },

    /// The id can't be carried in a compare route
    #[error("Invalid instrument id: {0:?}")]
    InvalidItemId(String),
}

/// Record passed to listeners after a successful mutation
#[derive(Debug, Clone)]
pub struct CompareChange {
    pub kind: CompareChangeKind,
    /// Item added or removed; `None` for clear
    pub item_id: Option<String>,
    /// Full set after the change
    pub entries: Vec<CompareEntry>,
}

impl CompareChange {
    pub fn item_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.item_id.clone()).collect()
    }
}

type Listener = Arc<dyn Fn(&CompareChange) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Handle returned by [`CompareStore::on_change`]
///
/// The listener stays registered while the handle is alive; dropping the
/// handle (or calling [`Subscription::unsubscribe`]) removes it.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The compared set plus its persistence and listeners
pub struct CompareStore {
    entries: Vec<CompareEntry>,
    storage: Box<dyn CompareStorage>,
    listeners: Arc<Mutex<ListenerRegistry>>,
}

impl CompareStore {
    /// Create a store, hydrating from `storage`
    ///
    /// An absent or unreadable record yields an empty set. A readable record
    /// is normalized: invalid ids and duplicates are dropped and the set is
    /// truncated to [`MAX_COMPARE_ITEMS`].
    pub fn new(storage: Box<dyn CompareStorage>) -> Self {
        let entries = match storage.load() {
            Ok(Some(entries)) => normalize(entries),
            Ok(None) => {
                debug!("No persisted compare record; starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable compare record: {}", e);
                Vec::new()
            }
        };

        if !entries.is_empty() {
            info!("Restored {} compared item(s)", entries.len());
        }

        Self {
            entries,
            storage,
            listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
        }
    }

    /// Whether `add(item_id)` would succeed right now
    ///
    /// Checks, in order: capacity, duplicate, id validity.
    pub fn check_add(&self, item_id: &str) -> Result<(), CompareError> {
        if self.entries.len() >= MAX_COMPARE_ITEMS {
            return Err(CompareError::CapacityExceeded {
                max: MAX_COMPARE_ITEMS,
            });
        }
        if self.contains(item_id) {
            return Err(CompareError::DuplicateEntry {
                item_id: item_id.to_string(),
            });
        }
        if !is_valid_item_id(item_id) {
            return Err(CompareError::InvalidItemId(item_id.to_string()));
        }
        Ok(())
    }

    /// Append `item_id` to the set; see [`CompareStore::check_add`]
    pub fn add(&mut self, item_id: &str) -> Result<&CompareEntry, CompareError> {
        self.check_add(item_id)?;

        self.entries.push(CompareEntry::new(item_id));
        debug!("Added {} to comparison ({} items)", item_id, self.entries.len());
        self.commit(CompareChangeKind::Added, Some(item_id.to_string()));

        let index = self.entries.len() - 1;
        Ok(&self.entries[index])
    }

    /// Remove `item_id` if present; returns whether anything was removed
    ///
    /// Removing an absent id neither persists nor notifies.
    pub fn remove(&mut self, item_id: &str) -> bool {
        let Some(index) = self.entries.iter().position(|e| e.item_id == item_id) else {
            return false;
        };

        self.entries.remove(index);
        debug!("Removed {} from comparison ({} items)", item_id, self.entries.len());
        self.commit(CompareChangeKind::Removed, Some(item_id.to_string()));
        true
    }

    /// Empty the set unconditionally
    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("Comparison cleared");
        self.commit(CompareChangeKind::Cleared, None);
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.iter().any(|e| e.item_id == item_id)
    }

    /// Entries in insertion order
    pub fn all(&self) -> &[CompareEntry] {
        &self.entries
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.item_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_COMPARE_ITEMS
    }

    pub fn remaining_slots(&self) -> usize {
        MAX_COMPARE_ITEMS.saturating_sub(self.entries.len())
    }

    /// Register a listener called synchronously after each mutation
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CompareChange) + Send + Sync + 'static,
    {
        let mut registry = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    /// Persist, then notify
    ///
    /// A failed write is logged; the in-memory set stays authoritative.
    fn commit(&self, kind: CompareChangeKind, item_id: Option<String>) {
        if let Err(e) = self.storage.save(&self.entries) {
            warn!("Failed to persist compare set (keeping in-memory state): {}", e);
        }

        // Snapshot the listeners so one may register or drop others
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        if listeners.is_empty() {
            return;
        }

        let change = CompareChange {
            kind,
            item_id,
            entries: self.entries.clone(),
        };
        for listener in listeners {
            listener(&change);
        }
    }
}

impl std::fmt::Debug for CompareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareStore")
            .field("entries", &self.entries)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn normalize(entries: Vec<CompareEntry>) -> Vec<CompareEntry> {
    let total = entries.len();
    let mut seen = HashSet::new();
    let normalized: Vec<CompareEntry> = entries
        .into_iter()
        .filter(|e| is_valid_item_id(&e.item_id) && seen.insert(e.item_id.clone()))
        .take(MAX_COMPARE_ITEMS)
        .collect();

    if normalized.len() != total {
        warn!(
            "Persisted compare record had {} entries, kept {}",
            total,
            normalized.len()
        );
    }
    normalized
}
