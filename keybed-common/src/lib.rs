//! # Keybed Common Library
//!
//! Shared code for the Keybed storefront services including:
//! - Catalog data model (instruments, specification documents, FAQs)
//! - Event types (KeybedEvent enum) and the EventBus
//! - Configuration loading
//! - Database initialization
//! - SSE helpers and time utilities

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
