//! Comparison API
//!
//! Mutations answer with the canonical route and `history: "replace"`: the
//! client overwrites its current history entry, it never pushes one. Only
//! the `/compare` pages decode a route into the store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::compare::reconcile::{reconcile, ReconciledComparisonTable};
use crate::compare::resolver::resolve;
use crate::compare::{
    route_for, ArrivalReport, CompareEntry, CompareError, CompareState, Notice,
    COMPARE_BASE_ROUTE, MAX_COMPARE_ITEMS,
};
use crate::AppState;

/// How clients apply the returned route to their history
pub const HISTORY_MODE: &str = "replace";

/// Current compared set, plus the outcome of a mutation
#[derive(Debug, Serialize)]
pub struct CompareSetResponse {
    pub items: Vec<CompareEntry>,
    pub count: usize,
    pub max_items: usize,
    pub remaining_slots: usize,
    pub route: String,
    pub history: &'static str,
    /// Membership of the item a mutation targeted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_compare: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl CompareSetResponse {
    fn snapshot(compare: &CompareState) -> Self {
        let store = &compare.store;
        Self {
            items: store.all().to_vec(),
            count: store.len(),
            max_items: MAX_COMPARE_ITEMS,
            remaining_slots: store.remaining_slots(),
            route: route_for(store.all()),
            history: HISTORY_MODE,
            in_compare: None,
            notice: None,
        }
    }

    fn after(compare: &CompareState, item_id: &str, notice: Option<Notice>) -> Self {
        Self {
            in_compare: Some(compare.store.contains(item_id)),
            notice,
            ..Self::snapshot(compare)
        }
    }
}

/// GET /api/compare
pub async fn get_compare_set(State(state): State<AppState>) -> Json<CompareSetResponse> {
    let compare = state.compare.lock().await;
    Json(CompareSetResponse::snapshot(&compare))
}

/// POST /api/compare/:id
///
/// Fails with 409 when the set is full or already holds the item, 400 for
/// an id that can't be carried in a route, 404 for an unknown instrument.
pub async fn add_to_compare(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompareSetResponse>, CompareApiError> {
    let response = {
        let mut compare = state.compare.lock().await;
        add_locked(&state, &mut compare, &id).await?
    };

    record_compare(&state, &id).await;
    Ok(Json(response))
}

/// POST /api/compare/:id/toggle
///
/// Removes the item if compared, otherwise adds it.
pub async fn toggle_compare(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompareSetResponse>, CompareApiError> {
    let (response, added) = {
        let mut compare = state.compare.lock().await;
        if compare.store.remove(&id) {
            (CompareSetResponse::after(&compare, &id, Some(Notice::removed())), false)
        } else {
            (add_locked(&state, &mut compare, &id).await?, true)
        }
    };

    if added {
        record_compare(&state, &id).await;
    }
    Ok(Json(response))
}

/// DELETE /api/compare/:id
///
/// Removing an item that isn't compared changes nothing and carries no notice.
pub async fn remove_from_compare(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<CompareSetResponse> {
    let mut compare = state.compare.lock().await;
    let notice = compare.store.remove(&id).then(Notice::removed);
    Json(CompareSetResponse::after(&compare, &id, notice))
}

/// DELETE /api/compare
pub async fn clear_compare(State(state): State<AppState>) -> Json<CompareSetResponse> {
    let mut compare = state.compare.lock().await;
    compare.store.clear();

    let mut response = CompareSetResponse::snapshot(&compare);
    response.notice = Some(Notice::cleared());
    Json(response)
}

/// Precondition checks, catalog lookup and mutation under one lock
async fn add_locked(
    state: &AppState,
    compare: &mut CompareState,
    id: &str,
) -> Result<CompareSetResponse, CompareApiError> {
    let reject = |error: CompareError, compare: &CompareState| CompareApiError::Rejected {
        error,
        route: compare.route(),
    };

    if let Err(e) = compare.store.check_add(id) {
        return Err(reject(e, compare));
    }

    match state.catalog.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(CompareApiError::NotFound(format!("Instrument {} not found", id))),
        Err(e) => {
            error!("Catalog lookup for {} failed: {}", id, e);
            return Err(CompareApiError::DatabaseError(e.to_string()));
        }
    }

    if let Err(e) = compare.store.add(id).map(|_| ()) {
        return Err(reject(e, compare));
    }
    Ok(CompareSetResponse::after(compare, id, Some(Notice::added())))
}

/// Best-effort popularity bookkeeping for a successful add
async fn record_compare(state: &AppState, id: &str) {
    match state.catalog.increment_compare_count(id).await {
        Ok(true) => {}
        Ok(false) => debug!("No catalog record to count compare for {}", id),
        Err(e) => warn!("Failed to increment compare count for {}: {}", id, e),
    }
}

/// Comparison page response
#[derive(Debug, Serialize)]
pub struct CompareViewResponse {
    pub route: String,
    pub history: &'static str,
    /// Present when the request carried a route segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<ArrivalReport>,
    /// Compared ids with no catalog record
    pub dangling: Vec<String>,
    /// Compared ids whose lookup failed; kept in the set, left out of the table
    pub unavailable: Vec<String>,
    /// Whether the dangling ids were removed from the compared set
    pub pruned: bool,
    /// `None` when nothing resolvable is being compared
    pub table: Option<ReconciledComparisonTable>,
}

/// GET /compare
///
/// Arrival at the base route: shows the current set without changing it.
pub async fn compare_view(
    State(state): State<AppState>,
) -> Result<Json<CompareViewResponse>, CompareApiError> {
    let ids = state.compare.lock().await.store.item_ids();
    build_view(&state, ids, None).await
}

/// GET /compare/:segment
///
/// Applies the decoded ids per the configured route policy, then shows the
/// resulting set.
pub async fn compare_view_with_route(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Json<CompareViewResponse>, CompareApiError> {
    let route = format!("{}/{}", COMPARE_BASE_ROUTE, segment);
    let (ids, report) = {
        let mut compare = state.compare.lock().await;
        let report = compare.arrive(&route);
        (compare.store.item_ids(), report)
    };

    for id in &report.added {
        record_compare(&state, id).await;
    }
    build_view(&state, ids, Some(report)).await
}

/// Resolve all ids (waiting for every lookup), then reconcile
async fn build_view(
    state: &AppState,
    ids: Vec<String>,
    arrival: Option<ArrivalReport>,
) -> Result<Json<CompareViewResponse>, CompareApiError> {
    let resolver = resolve(&state.catalog, &ids).await;
    let dangling = resolver.dangling();
    let unavailable = resolver.unavailable();

    let mut compare = state.compare.lock().await;
    let mut pruned = false;
    if compare.prune_dangling && !dangling.is_empty() {
        for id in &dangling {
            compare.store.remove(id);
        }
        info!("Pruned {} dangling compare item(s)", dangling.len());
        pruned = true;
    }

    Ok(Json(CompareViewResponse {
        route: compare.route(),
        history: HISTORY_MODE,
        arrival,
        dangling,
        unavailable,
        pruned,
        table: reconcile(&resolver.resolved()),
    }))
}

/// Comparison API errors
#[derive(Debug)]
pub enum CompareApiError {
    /// The store refused the mutation; the set is unchanged
    Rejected { error: CompareError, route: String },
    NotFound(String),
    DatabaseError(String),
}

impl IntoResponse for CompareApiError {
    fn into_response(self) -> Response {
        match self {
            CompareApiError::Rejected { error, route } => {
                let status = match error {
                    CompareError::CapacityExceeded { .. } | CompareError::DuplicateEntry { .. } => {
                        StatusCode::CONFLICT
                    }
                    CompareError::InvalidItemId(_) => StatusCode::BAD_REQUEST,
                };
                let body = Json(json!({
                    "error": error.to_string(),
                    "notice": Notice::from(&error),
                    "route": route,
                    "history": HISTORY_MODE,
                }));
                (status, body).into_response()
            }
            CompareApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            CompareApiError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Database error: {}", msg) })),
            )
                .into_response(),
        }
    }
}
