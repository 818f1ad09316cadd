//! keybed-sf library - instrument storefront service
//!
//! Catalog browsing, product details, the comparison subsystem and a small
//! admin surface, served as JSON over HTTP.

use axum::Router;
use keybed_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod catalog;
pub mod compare;
pub mod pagination;

use catalog::SqliteCatalog;
use compare::CompareState;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: SqliteCatalog,
    /// The one compared set of this process; check and mutate under one lock
    pub compare: Arc<Mutex<CompareState>>,
    pub events: EventBus,
    /// Required in `x-admin-token`; `None` disables the admin API
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        catalog: SqliteCatalog,
        compare: CompareState,
        events: EventBus,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            catalog,
            compare: Arc::new(Mutex::new(compare)),
            events,
            admin_token: admin_token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }
}

/// Build application router
///
/// Health, build info and the event stream are public; admin routes sit
/// behind the admin token check.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post, put};

    let admin = Router::new()
        .route("/api/admin/instruments", post(api::admin::create_instrument))
        .route(
            "/api/admin/instruments/:id",
            put(api::admin::update_instrument).delete(api::admin::delete_instrument),
        )
        .route(
            "/api/admin/instruments/:id/details",
            put(api::admin::upsert_details),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::admin_middleware,
        ));

    let catalog = Router::new()
        .route("/api/instruments", get(api::instruments::list_instruments))
        .route("/api/instruments/latest", get(api::instruments::latest_instruments))
        .route("/api/instruments/:id", get(api::instruments::get_instrument))
        .route(
            "/api/brands/:brand/instruments",
            get(api::instruments::instruments_by_brand),
        );

    let compare = Router::new()
        .route(
            "/api/compare",
            get(api::compare::get_compare_set).delete(api::compare::clear_compare),
        )
        .route(
            "/api/compare/:id",
            post(api::compare::add_to_compare).delete(api::compare::remove_from_compare),
        )
        .route("/api/compare/:id/toggle", post(api::compare::toggle_compare))
        .route("/compare", get(api::compare::compare_view))
        .route("/compare/:segment", get(api::compare::compare_view_with_route));

    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/events", get(api::event_stream))
        .merge(api::health_routes());

    Router::new()
        .merge(admin)
        .merge(catalog)
        .merge(compare)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
