//! Catalog access
//!
//! The comparison core only reads the catalog, through [`CatalogAccessor`].
//! [`SqliteCatalog`] is the database-backed implementation that also serves
//! browsing and the admin surface.

pub mod filters;
pub mod sqlite;

pub use filters::{FilterOptions, ListingQuery, SortOption};
pub use sqlite::{InstrumentInput, SqliteCatalog};

use async_trait::async_trait;
use keybed_common::catalog::{CatalogRecord, ProductDetails, SpecificationDocument};
use keybed_common::Result;

/// Read-only lookups by item id
///
/// The same id always refers to the same product.
#[async_trait]
pub trait CatalogAccessor: Send + Sync {
    /// Basic record, `None` if no such item exists
    async fn get_basic_record(&self, id: &str) -> Result<Option<CatalogRecord>>;

    /// Extended product data, `None` if none was ever stored
    async fn get_product_details(&self, id: &str) -> Result<Option<ProductDetails>>;

    /// Categorized specification document, `None` if absent
    async fn get_specification_document(&self, id: &str) -> Result<Option<SpecificationDocument>> {
        Ok(self
            .get_product_details(id)
            .await?
            .and_then(|details| details.specifications))
    }
}
