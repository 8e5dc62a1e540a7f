//! Cache Namespaces
//!
//! Fixed table of logical key groups. Each namespace owns one key prefix and
//! one default TTL; prefixes are disjoint so every key belongs to at most one
//! namespace.

use serde::Serialize;

use super::key::KEY_DELIMITER;

// == Namespace ==
/// A fixed logical grouping of cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    /// Aggregated sales dashboard payloads
    Dashboard,
    /// Street-level imagery and address lookups from external providers
    ExternalImageLookup,
    /// Weather readings keyed by postal code
    Weather,
    /// Analytics aggregations
    Analytics,
    /// Competitor analytics rollups
    Competitors,
    /// Lead scoring results
    LeadScores,
}

impl Namespace {
    /// Every namespace, in table order.
    pub const ALL: [Namespace; 6] = [
        Namespace::Dashboard,
        Namespace::ExternalImageLookup,
        Namespace::Weather,
        Namespace::Analytics,
        Namespace::Competitors,
        Namespace::LeadScores,
    ];

    /// Public name used by callers and the admin API.
    pub const fn name(self) -> &'static str {
        match self {
            Namespace::Dashboard => "dashboard",
            Namespace::ExternalImageLookup => "external-image-lookup",
            Namespace::Weather => "weather",
            Namespace::Analytics => "analytics",
            Namespace::Competitors => "competitors",
            Namespace::LeadScores => "lead-scores",
        }
    }

    /// Key prefix stored in the backend.
    pub const fn prefix(self) -> &'static str {
        match self {
            Namespace::Dashboard => "dashboard",
            Namespace::ExternalImageLookup => "imagery",
            Namespace::Weather => "weather",
            Namespace::Analytics => "analytics",
            Namespace::Competitors => "competitors",
            Namespace::LeadScores => "leadscore",
        }
    }

    /// Default TTL in seconds.
    pub const fn default_ttl_seconds(self) -> u64 {
        match self {
            Namespace::Dashboard => 30,
            Namespace::ExternalImageLookup => 3600,
            Namespace::Weather => 300,
            Namespace::Analytics => 60,
            Namespace::Competitors => 600,
            Namespace::LeadScores => 120,
        }
    }

    /// Position in [`Namespace::ALL`], used to index per-namespace counters.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Looks a namespace up by its public name.
    pub fn from_name(name: &str) -> Option<Namespace> {
        Self::ALL.into_iter().find(|ns| ns.name() == name)
    }

    /// Prefix that every key in this namespace starts with, delimiter included.
    pub fn scan_prefix(self) -> String {
        format!("{}{}", self.prefix(), KEY_DELIMITER)
    }

    /// Resolves the namespace a key belongs to by longest-prefix match.
    ///
    /// A prefix only matches on a segment boundary: `weather:19020` resolves
    /// to `weather`, `weatherman:1` resolves to nothing.
    pub fn resolve(key: &str) -> Option<Namespace> {
        Self::ALL
            .into_iter()
            .filter(|ns| {
                key.strip_prefix(ns.prefix())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(KEY_DELIMITER))
            })
            .max_by_key(|ns| ns.prefix().len())
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Row of the namespace table as exposed to operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceInfo {
    pub name: &'static str,
    pub key_prefix: &'static str,
    pub default_ttl_seconds: u64,
}

impl From<Namespace> for NamespaceInfo {
    fn from(ns: Namespace) -> Self {
        Self {
            name: ns.name(),
            key_prefix: ns.prefix(),
            default_ttl_seconds: ns.default_ttl_seconds(),
        }
    }
}
