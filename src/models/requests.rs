//! Request DTOs for the cache admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::Namespace;

/// Upper bound on a built key, checked before anything reaches the backend.
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for storing an entry (PUT /cache/entries)
///
/// # Fields
/// - `namespace`: Public namespace name (e.g. `weather`)
/// - `parts`: Key parts appended to the namespace prefix
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (namespace default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetEntryRequest {
    pub namespace: String,
    #[serde(default)]
    pub parts: Vec<String>,
    pub value: serde_json::Value,
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetEntryRequest {
    /// Validates the request and resolves its namespace.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<Namespace, String> {
        let namespace = Namespace::from_name(&self.namespace)
            .ok_or_else(|| format!("Unknown namespace '{}'", self.namespace))?;

        if self.parts.iter().any(|p| p.is_empty()) {
            return Err("Key parts cannot be empty".to_string());
        }
        let key_len = namespace.prefix().len()
            + self.parts.iter().map(|p| p.len() + 1).sum::<usize>();
        if key_len > MAX_KEY_LENGTH {
            return Err(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl == Some(0) {
            return Err("TTL must be at least 1 second".to_string());
        }
        Ok(namespace)
    }
}
