//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /cache/stats` - Stats snapshot
//! - `DELETE /cache/stats` - Reset counters
//! - `GET /cache/namespaces` - Namespace table
//! - `DELETE /cache/namespaces/:namespace` - Invalidate a namespace
//! - `PUT /cache/entries` - Store a value under a built key
//! - `GET /cache/entries/:key` - Read a value
//! - `DELETE /cache/entries/:key` - Delete a key

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
