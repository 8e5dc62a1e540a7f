//! Namespace Cache - a namespaced cache facade
//!
//! Fronts either a distributed key-value store or an in-process fallback,
//! tracks hit/miss stats per namespace, and invalidates whole namespaces.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{build_key, hash_string, CacheService, Namespace};
pub use config::{BackendConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
