//! Comparison session: keeps the shareable route and the store in step
//!
//! Two directions, never mixed:
//! - store → route: every mutation re-encodes the set and *replaces* the
//!   current history entry.
//! - route → store: only on a genuine arrival (initial load, back/forward,
//!   explicit navigation) the decoded ids are applied per [`RoutePolicy`].

use keybed_common::config::RoutePolicy;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::codec::{is_valid_item_id, parse_route, route_for};
use super::store::{CompareError, CompareStore, Subscription};

/// Minimal navigation history: entries plus a cursor
#[derive(Debug, Clone)]
pub struct RouteHistory {
    entries: Vec<String>,
    cursor: usize,
}

impl RouteHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            cursor: 0,
        }
    }

    /// New entry after the cursor; forward entries are discarded
    pub fn push(&mut self, route: impl Into<String>) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(route.into());
        self.cursor = self.entries.len() - 1;
    }

    /// Overwrite the current entry in place
    pub fn replace(&mut self, route: impl Into<String>) {
        self.entries[self.cursor] = route.into();
    }

    pub fn back(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    pub fn forward(&mut self) -> Option<&str> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    pub fn current(&self) -> &str {
        &self.entries[self.cursor]
    }

    /// Never zero: the initial entry always exists
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// An id from the route that could not be applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub item_id: String,
    pub reason: String,
}

impl SkippedItem {
    fn new(item_id: String, err: &CompareError) -> Self {
        Self {
            item_id,
            reason: err.to_string(),
        }
    }
}

/// Outcome of applying an arrival route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrivalReport {
    /// Whether the store was mutated
    pub changed: bool,
    /// Ids added to the store, in order
    pub added: Vec<String>,
    pub skipped: Vec<SkippedItem>,
    /// Canonical route after the arrival
    pub route: String,
}

/// Binds a [`RouteHistory`] to a [`CompareStore`]
pub struct ComparisonSession {
    policy: RoutePolicy,
    history: Arc<Mutex<RouteHistory>>,
    _subscription: Subscription,
}

impl ComparisonSession {
    /// Start a session with `initial_route` as the first history entry
    ///
    /// Registers a store listener that replaces the current entry with the
    /// canonical route after every mutation.
    pub fn attach(store: &CompareStore, policy: RoutePolicy, initial_route: &str) -> Self {
        let history = Arc::new(Mutex::new(RouteHistory::new(initial_route)));

        let sink = Arc::clone(&history);
        let subscription = store.on_change(move |change| {
            let route = route_for(&change.entries);
            lock(&sink).replace(route);
        });

        Self {
            policy,
            history,
            _subscription: subscription,
        }
    }

    pub fn policy(&self) -> RoutePolicy {
        self.policy
    }

    pub fn current_route(&self) -> String {
        lock(&self.history).current().to_string()
    }

    pub fn history(&self) -> RouteHistory {
        lock(&self.history).clone()
    }

    /// Apply an arrival at `route` to the store
    ///
    /// The base route (or any non-compare route) leaves the store untouched.
    /// Ids that fail to add are skipped and reported; they never abort the
    /// arrival.
    pub fn arrive(&self, store: &mut CompareStore, route: &str) -> ArrivalReport {
        let ids = match parse_route(route) {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                debug!("Arrival at {} leaves the compare set untouched", route);
                return self.report(store, false, Vec::new(), Vec::new());
            }
        };

        // Invalid ids are dropped before anything touches the store
        let (ids, invalid): (Vec<String>, Vec<String>) =
            ids.into_iter().partition(|id| is_valid_item_id(id));
        let mut skipped: Vec<SkippedItem> = invalid
            .into_iter()
            .map(|id| {
                let err = CompareError::InvalidItemId(id.clone());
                SkippedItem::new(id, &err)
            })
            .collect();

        if ids.is_empty() {
            debug!("Arrival at {} carries no valid ids; compare set untouched", route);
            return self.report(store, false, Vec::new(), skipped);
        }

        if self.policy == RoutePolicy::Replace && ids == store.item_ids() {
            debug!("Arrival route matches current set");
            return self.report(store, false, Vec::new(), skipped);
        }

        let mut changed = false;
        let mut added = Vec::new();

        if self.policy == RoutePolicy::Replace && !store.is_empty() {
            store.clear();
            changed = true;
        }

        for id in ids {
            if self.policy == RoutePolicy::Merge && store.contains(&id) {
                continue;
            }
            match store.add(&id) {
                Ok(_) => {
                    changed = true;
                    added.push(id);
                }
                Err(e) => {
                    debug!("Skipping {} from arrival route: {}", id, e);
                    skipped.push(SkippedItem::new(id, &e));
                }
            }
        }

        info!(
            "Applied arrival route ({:?}): {} added, {} skipped",
            self.policy,
            added.len(),
            skipped.len()
        );
        self.report(store, changed, added, skipped)
    }

    /// Explicit navigation: push a new history entry, then arrive
    pub fn navigate(&self, store: &mut CompareStore, route: &str) -> ArrivalReport {
        lock(&self.history).push(route);
        self.arrive(store, route)
    }

    /// Step back in history and arrive there; `None` at the first entry
    pub fn back(&self, store: &mut CompareStore) -> Option<ArrivalReport> {
        let route = lock(&self.history).back()?.to_string();
        Some(self.arrive(store, &route))
    }

    /// Step forward in history and arrive there; `None` at the last entry
    pub fn forward(&self, store: &mut CompareStore) -> Option<ArrivalReport> {
        let route = lock(&self.history).forward()?.to_string();
        Some(self.arrive(store, &route))
    }

    fn report(
        &self,
        store: &CompareStore,
        changed: bool,
        added: Vec<String>,
        skipped: Vec<SkippedItem>,
    ) -> ArrivalReport {
        ArrivalReport {
            changed,
            added,
            skipped,
            route: route_for(store.all()),
        }
    }
}

fn lock(history: &Mutex<RouteHistory>) -> MutexGuard<'_, RouteHistory> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}
