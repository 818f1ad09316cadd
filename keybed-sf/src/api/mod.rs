//! HTTP API handlers for keybed-sf

pub mod admin;
pub mod buildinfo;
pub mod compare;
pub mod health;
pub mod instruments;
pub mod sse;

pub use admin::admin_middleware;
pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sse::event_stream;
