//! Resolve compared ids to catalog data
//!
//! Record and document lookups for every item run concurrently and settle
//! independently. Results land in the slot for their id, so the order in
//! which lookups complete never affects the column order. The table is only
//! built once every slot has settled.

use futures::future::join_all;
use keybed_common::catalog::{CatalogRecord, SpecificationDocument};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::catalog::CatalogAccessor;

/// Specification document of a resolved item
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    Present(SpecificationDocument),
    /// None stored, or the lookup failed
    Absent,
}

/// A compared item with its catalog data
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    pub record: CatalogRecord,
    pub document: DocumentState,
}

/// Lookup state for one compared id
#[derive(Debug, Clone, PartialEq)]
pub enum ItemResolution {
    Pending,
    /// The id has no catalog record
    Dangling,
    /// The record lookup failed; the item may still exist
    Unavailable,
    Resolved(ResolvedItem),
}

impl ItemResolution {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ItemResolution::Pending)
    }
}

/// Per-id resolution slots in comparison order
#[derive(Debug, Clone)]
pub struct ComparisonResolver {
    slots: Vec<(String, ItemResolution)>,
}

impl ComparisonResolver {
    pub fn new(ids: &[String]) -> Self {
        Self {
            slots: ids
                .iter()
                .map(|id| (id.clone(), ItemResolution::Pending))
                .collect(),
        }
    }

    /// Record the outcome for `id`; unknown ids are ignored
    pub fn settle(&mut self, id: &str, resolution: ItemResolution) {
        match self.slots.iter_mut().find(|(slot_id, _)| slot_id == id) {
            Some((_, slot)) => *slot = resolution,
            None => debug!("Ignoring resolution for {} (not compared)", id),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(|(_, r)| r.is_settled())
    }

    pub fn slot(&self, id: &str) -> Option<&ItemResolution> {
        self.slots.iter().find(|(slot_id, _)| slot_id == id).map(|(_, r)| r)
    }

    /// Resolved items in comparison order
    pub fn resolved(&self) -> Vec<ResolvedItem> {
        self.slots
            .iter()
            .filter_map(|(_, r)| match r {
                ItemResolution::Resolved(item) => Some(item.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids without a catalog record, in comparison order
    pub fn dangling(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, r)| matches!(r, ItemResolution::Dangling))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Ids whose record lookup failed for this resolution, in comparison order
    pub fn unavailable(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, r)| matches!(r, ItemResolution::Unavailable))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Look up every slot concurrently and wait for all of them
    pub async fn resolve_all(&mut self, catalog: &dyn CatalogAccessor) {
        let lookups = self.slots.iter().map(|(id, _)| {
            let id = id.clone();
            async move {
                let resolution = resolve_one(catalog, &id).await;
                (id, resolution)
            }
        });

        let outcomes: HashMap<String, ItemResolution> = join_all(lookups).await.into_iter().collect();
        for (id, resolution) in outcomes {
            self.settle(&id, resolution);
        }
    }
}

/// Resolve `ids` against `catalog`, waiting for every lookup
pub async fn resolve(catalog: &dyn CatalogAccessor, ids: &[String]) -> ComparisonResolver {
    let mut resolver = ComparisonResolver::new(ids);
    resolver.resolve_all(catalog).await;
    resolver
}

async fn resolve_one(catalog: &dyn CatalogAccessor, id: &str) -> ItemResolution {
    let (record, document) = futures::join!(
        catalog.get_basic_record(id),
        catalog.get_specification_document(id)
    );

    let record = match record {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!("Compared item {} has no catalog record", id);
            return ItemResolution::Dangling;
        }
        Err(e) => {
            warn!("Record lookup for {} failed: {}", id, e);
            return ItemResolution::Unavailable;
        }
    };

    let document = match document {
        Ok(Some(doc)) => DocumentState::Present(doc),
        Ok(None) => DocumentState::Absent,
        Err(e) => {
            warn!("Specification lookup for {} failed: {}", id, e);
            DocumentState::Absent
        }
    };

    ItemResolution::Resolved(ResolvedItem { record, document })
}
