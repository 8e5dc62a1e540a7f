//! API Handlers
//!
//! HTTP request handlers for each cache admin endpoint.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{build_key, CacheService, Namespace, NamespaceInfo, StatsSnapshot};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, InvalidateResponse, SetEntryRequest, SetResponse,
};

/// Application state shared across all handlers.
///
/// Holds the one cache service built at startup; clones share it.
#[derive(Clone)]
pub struct AppState {
    pub cache: CacheService,
}

impl AppState {
    /// Creates a new AppState around an existing cache service.
    pub fn new(cache: CacheService) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Selects the cache backend once; fails only on an unusable store URL.
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Ok(Self::new(CacheService::new(&config.backend)?))
    }
}

/// Handler for PUT /cache/entries
///
/// Builds the key from namespace and parts, then stores the value.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetEntryRequest>,
) -> Result<Json<SetResponse>> {
    let namespace = req.validate().map_err(CacheError::InvalidRequest)?;

    let key = build_key(namespace, &req.parts);
    let ttl = req.ttl.unwrap_or(namespace.default_ttl_seconds());

    if !state.cache.set(&key, &req.value, ttl).await? {
        return Err(CacheError::Backend(format!("failed to store '{}'", key)));
    }

    Ok(Json(SetResponse::new(key, ttl)))
}

/// Handler for GET /cache/entries/:key
///
/// Reads a value through the cache service, so it counts toward stats.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get::<serde_json::Value>(&key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /cache/entries/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.delete(&key).await {
        return Err(CacheError::Backend(format!("failed to delete '{}'", key)));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /cache/namespaces/:namespace
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let namespace = Namespace::from_name(&name)
        .ok_or_else(|| CacheError::NotFound(format!("namespace '{}'", name)))?;

    if !state.cache.invalidate_namespace(namespace).await {
        return Err(CacheError::Backend(format!(
            "failed to invalidate namespace '{}'",
            name
        )));
    }

    Ok(Json(InvalidateResponse::new(name)))
}

/// Handler for GET /cache/namespaces
pub async fn namespaces_handler() -> Json<Vec<NamespaceInfo>> {
    Json(Namespace::ALL.into_iter().map(NamespaceInfo::from).collect())
}

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.cache.stats().await)
}

/// Handler for DELETE /cache/stats
///
/// Resets every counter and returns the fresh snapshot.
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    state.cache.reset_stats();
    Json(state.cache.stats().await)
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.backend_kind()))
}
