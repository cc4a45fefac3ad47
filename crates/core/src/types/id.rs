//! Product identifiers.
//!
//! Identifiers are opaque strings so that seed records (`"3"`), legacy
//! numeric ids and generated ids (`"prod-<uuid>"`) can live in one catalog.

use serde::{Deserialize, Serialize};

/// Prefix applied to identifiers generated by the catalog.
pub const GENERATED_ID_PREFIX: &str = "prod-";

/// Separators recognized between a legacy prefix and the bare identifier.
const LEGACY_SEPARATORS: [char; 2] = ['-', '_'];

/// A stable product identifier.
///
/// Assigned once at creation and never changed afterwards.
///
/// # Example
///
/// ```rust
/// # use kaline_core::ProductId;
/// let id = ProductId::new("prod-42");
/// assert!(id.matches_legacy("42"));
/// assert!(!id.matches_legacy("2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, globally unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{GENERATED_ID_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `query` refers to this identifier under an older id scheme.
    ///
    /// Matches in both directions: a bare `"42"` finds `"prod-42"`, and a
    /// prefixed `"prod-42"` finds a stored bare `"42"`. Exact equality is not
    /// considered a legacy match.
    #[must_use]
    pub fn matches_legacy(&self, query: &str) -> bool {
        if query.is_empty() || self.0 == query {
            return false;
        }
        is_prefixed_form(&self.0, query) || is_prefixed_form(query, &self.0)
    }
}

/// `long` is `bare` with some non-empty prefix ending in a separator.
fn is_prefixed_form(long: &str, bare: &str) -> bool {
    long.strip_suffix(bare)
        .and_then(|prefix| prefix.chars().last())
        .is_some_and(|c| LEGACY_SEPARATORS.contains(&c))
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
