//! Catalog browsing API
//!
//! Filtered/sorted listings (24 per page), brand pages, latest releases and
//! the product detail view.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keybed_common::catalog::{Brand, CatalogRecord, ProductDetails};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::error;

use crate::catalog::ListingQuery;
use crate::pagination::{Pagination, PAGE_SIZE};
use crate::AppState;

/// Default and maximum size of the latest-releases list
const DEFAULT_LATEST_LIMIT: i64 = 6;
const MAX_LATEST_LIMIT: i64 = 50;

/// Paginated listing response
#[derive(Debug, Serialize)]
pub struct InstrumentListResponse {
    pub instruments: Vec<CatalogRecord>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// GET /api/instruments
///
/// Query: `page`, `sort` (`price-low-high`, `price-high-low`, `popularity`,
/// `rating`, `newest`), `min_price`, `max_price`, `brands`, `years`,
/// `has_sequencer`. Without `sort`, newest-created records come first.
pub async fn list_instruments(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<InstrumentListResponse>, CatalogApiError> {
    let filters = query.filters()?;
    let sort = query.sort()?;

    let total_results = state.catalog.count(&filters).await?;
    let pagination = Pagination::new(total_results, query.page, PAGE_SIZE);

    let instruments = state
        .catalog
        .list(&filters, sort, pagination.page_size, pagination.offset)
        .await?;

    Ok(Json(InstrumentListResponse {
        instruments,
        pagination,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(default = "default_latest_limit")]
    pub limit: i64,
}

fn default_latest_limit() -> i64 {
    DEFAULT_LATEST_LIMIT
}

/// GET /api/instruments/latest
pub async fn latest_instruments(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<CatalogRecord>>, CatalogApiError> {
    let limit = query.limit.clamp(1, MAX_LATEST_LIMIT);
    Ok(Json(state.catalog.latest(limit).await?))
}

#[derive(Debug, Serialize)]
pub struct BrandInstrumentsResponse {
    pub brand: Brand,
    pub instruments: Vec<CatalogRecord>,
}

/// GET /api/brands/:brand/instruments
///
/// Brand names match case-insensitively; an unknown brand is a 404.
pub async fn instruments_by_brand(
    State(state): State<AppState>,
    Path(brand): Path<String>,
) -> Result<Json<BrandInstrumentsResponse>, CatalogApiError> {
    let brand = Brand::from_str(&brand)
        .map_err(|_| CatalogApiError::NotFound(format!("Brand {} not found", brand)))?;

    let instruments = state.catalog.by_brand(brand).await?;
    Ok(Json(BrandInstrumentsResponse { brand, instruments }))
}

/// Product detail response
#[derive(Debug, Serialize)]
pub struct ProductDetailResponse {
    pub instrument: CatalogRecord,
    /// Empty when no extended data is stored
    pub details: ProductDetails,
    /// Whether the instrument is currently being compared
    pub in_compare: bool,
}

/// GET /api/instruments/:id
pub async fn get_instrument(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetailResponse>, CatalogApiError> {
    let instrument = state
        .catalog
        .get(&id)
        .await?
        .ok_or_else(|| CatalogApiError::NotFound(format!("Instrument {} not found", id)))?;

    let details = state.catalog.details(&id).await?.unwrap_or_default();
    let in_compare = state.compare.lock().await.store.contains(&id);

    Ok(Json(ProductDetailResponse {
        instrument,
        details,
        in_compare,
    }))
}

/// Catalog API errors
#[derive(Debug)]
pub enum CatalogApiError {
    InvalidQuery(String),
    NotFound(String),
    DatabaseError(String),
}

impl From<keybed_common::Error> for CatalogApiError {
    fn from(err: keybed_common::Error) -> Self {
        match err {
            keybed_common::Error::InvalidInput(msg) => CatalogApiError::InvalidQuery(msg),
            keybed_common::Error::NotFound(msg) => CatalogApiError::NotFound(msg),
            other => {
                error!("Catalog query failed: {}", other);
                CatalogApiError::DatabaseError(other.to_string())
            }
        }
    }
}

impl IntoResponse for CatalogApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            CatalogApiError::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg),
            CatalogApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            CatalogApiError::DatabaseError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", msg))
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
