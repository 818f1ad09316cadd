//! Comparison subsystem
//!
//! - [`store`]: the bounded, persisted, observable compared set
//! - [`codec`] / [`session`]: shareable route encoding and arrival handling
//! - [`resolver`]: concurrent catalog lookups for the compared ids
//! - [`reconcile`]: aligned specification table across compared items

pub mod codec;
pub mod reconcile;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod store;

pub use codec::{route_for, COMPARE_BASE_ROUTE};
pub use reconcile::{reconcile, ReconciledComparisonTable, ABSENCE_MARKER};
pub use resolver::{resolve, ComparisonResolver, DocumentState, ItemResolution, ResolvedItem};
pub use session::{ArrivalReport, ComparisonSession, RouteHistory, SkippedItem};
pub use storage::{CompareStorage, JsonFileStorage, MemoryStorage};
pub use store::{
    CompareChange, CompareEntry, CompareError, CompareStore, Subscription, MAX_COMPARE_ITEMS,
};

use keybed_common::config::RoutePolicy;
use keybed_common::events::{EventBus, KeybedEvent};
use serde::Serialize;

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Short message shown to the user after a compare action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn added() -> Self {
        Self::success("Added to comparison list")
    }

    pub fn removed() -> Self {
        Self::success("Removed from comparison list")
    }

    pub fn cleared() -> Self {
        Self::success("Comparison list cleared")
    }

    fn success(message: &str) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.to_string(),
        }
    }
}

impl From<&CompareError> for Notice {
    fn from(err: &CompareError) -> Self {
        let level = match err {
            CompareError::DuplicateEntry { .. } => NoticeLevel::Info,
            CompareError::CapacityExceeded { .. } | CompareError::InvalidItemId(_) => {
                NoticeLevel::Error
            }
        };
        Self {
            level,
            message: err.to_string(),
        }
    }
}

/// Process-wide comparison state owned by the HTTP layer
///
/// Bundles the store with its route session and forwards every mutation to
/// the [`EventBus`] so SSE clients can replace their current history entry.
pub struct CompareState {
    pub store: CompareStore,
    pub session: ComparisonSession,
    pub prune_dangling: bool,
    _events: Subscription,
}

impl CompareState {
    pub fn new(
        storage: Box<dyn CompareStorage>,
        policy: RoutePolicy,
        prune_dangling: bool,
        events: EventBus,
    ) -> Self {
        let store = CompareStore::new(storage);
        let session = ComparisonSession::attach(&store, policy, &route_for(store.all()));

        let forward = store.on_change(move |change| {
            events.emit_lossy(KeybedEvent::CompareSetChanged {
                change: change.kind,
                item_id: change.item_id.clone(),
                item_ids: change.item_ids(),
                route: route_for(&change.entries),
                timestamp: keybed_common::time::now(),
            });
        });

        Self {
            store,
            session,
            prune_dangling,
            _events: forward,
        }
    }

    /// Canonical route for the current set
    pub fn route(&self) -> String {
        route_for(self.store.all())
    }

    /// Apply a route arrival to the store
    pub fn arrive(&mut self, route: &str) -> ArrivalReport {
        self.session.arrive(&mut self.store, route)
    }
}
