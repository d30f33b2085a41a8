//! Quotebook Common Library
//!
//! Shared code for the Quotebook services including:
//! - Content domain (quotes, quote authors, quote pieces)
//! - Database models and the generic content repository
//! - Content services: lifecycle, listing, moderation, quote creation
//! - Host platform collaborators (tags, users, revisions, review, meta)
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Caching, search indexing and the in-process outbox
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod config;
pub mod content;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod platform;
pub mod queue;
pub mod schema;
pub mod search;
pub mod services;
pub mod short_id;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use content::{ContentEntity, ContentKind, ContentStatus, Lookup, RequestContext};
pub use db::{ContentRepo, SeaContentRepo};
pub use errors::{AppError, Result};
pub use services::{ContentService, QuoteService, Viewer};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
