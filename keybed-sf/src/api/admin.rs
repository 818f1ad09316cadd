//! Admin catalog management
//!
//! Direct insert/update/delete of instruments and their product details,
//! behind a static token sent as `x-admin-token`. Without a configured
//! token every admin route answers 403.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use keybed_common::catalog::{CatalogRecord, ProductDetails};
use keybed_common::events::{InstrumentAction, KeybedEvent};
use serde_json::json;
use tracing::{error, info, warn};

use crate::catalog::InstrumentInput;
use crate::AppState;

/// Header carrying the admin token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin token middleware
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AdminError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(AdminError::Disabled);
    };

    let authorized = request
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|token| token == expected);

    if !authorized {
        warn!("Rejected admin request: {} {}", request.method(), request.uri());
        return Err(AdminError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// POST /api/admin/instruments
pub async fn create_instrument(
    State(state): State<AppState>,
    Json(input): Json<InstrumentInput>,
) -> Result<(StatusCode, Json<CatalogRecord>), AdminError> {
    let record = state.catalog.insert(&input).await?;
    info!("Admin created instrument {}", record.id);
    announce(&state, &record.id, InstrumentAction::Created);
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/admin/instruments/:id
pub async fn update_instrument(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<InstrumentInput>,
) -> Result<Json<CatalogRecord>, AdminError> {
    let record = state
        .catalog
        .update(&id, &input)
        .await?
        .ok_or_else(|| AdminError::NotFound(id.clone()))?;

    info!("Admin updated instrument {}", id);
    announce(&state, &id, InstrumentAction::Updated);
    Ok(Json(record))
}

/// DELETE /api/admin/instruments/:id
///
/// Compared sets keep the id; it shows up as dangling until removed.
pub async fn delete_instrument(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    if !state.catalog.delete(&id).await? {
        return Err(AdminError::NotFound(id));
    }

    info!("Admin deleted instrument {}", id);
    announce(&state, &id, InstrumentAction::Deleted);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/instruments/:id/details
pub async fn upsert_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(details): Json<ProductDetails>,
) -> Result<Json<ProductDetails>, AdminError> {
    state.catalog.upsert_details(&id, &details).await?;

    info!("Admin stored product details for {}", id);
    announce(&state, &id, InstrumentAction::DetailsUpdated);
    Ok(Json(details))
}

fn announce(state: &AppState, id: &str, action: InstrumentAction) {
    state.events.emit_lossy(KeybedEvent::InstrumentChanged {
        instrument_id: id.to_string(),
        action,
        timestamp: keybed_common::time::now(),
    });
}

/// Admin API errors
#[derive(Debug)]
pub enum AdminError {
    /// No admin token configured
    Disabled,
    Unauthorized,
    InvalidInput(String),
    NotFound(String),
    DatabaseError(String),
}

impl From<keybed_common::Error> for AdminError {
    fn from(err: keybed_common::Error) -> Self {
        match err {
            keybed_common::Error::InvalidInput(msg) => AdminError::InvalidInput(msg),
            keybed_common::Error::NotFound(msg) => AdminError::NotFound(msg),
            other => {
                error!("Admin operation failed: {}", other);
                AdminError::DatabaseError(other.to_string())
            }
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::Disabled => (
                StatusCode::FORBIDDEN,
                "Admin API disabled (no admin token configured)".to_string(),
            ),
            AdminError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                format!("Missing or invalid {} header", ADMIN_TOKEN_HEADER),
            ),
            AdminError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AdminError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {}", what)),
            AdminError::DatabaseError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", msg))
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
