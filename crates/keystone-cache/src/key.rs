//! Module-scoped cache keys
//!
//! Keys built here have the shape `module:namespace:resource[:identifier]`.
//! Each segment is trimmed, inner whitespace becomes `-`, anything outside
//! `[A-Za-z0-9_-]` is dropped and the result is lowercased, so
//! `"Journal Entries"` and `"journal-entries"` address the same entry.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Separator between key segments
pub const KEY_SEPARATOR: char = ':';

/// A normalised cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-formed key without normalising it
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for CacheKey {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parts of a key below the module segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKeyParts<'a> {
    pub namespace: &'a str,
    pub resource: &'a str,
    pub identifier: Option<&'a str>,
}

impl<'a> CacheKeyParts<'a> {
    /// Create a new key description without an identifier
    pub fn new(namespace: &'a str, resource: &'a str) -> Self {
        Self {
            namespace,
            resource,
            identifier: None,
        }
    }

    /// Narrow the key to a single item
    pub fn with_identifier(mut self, identifier: &'a str) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

fn normalize_segment(segment: &str) -> String {
    let mut normalized = String::with_capacity(segment.len());
    let mut in_whitespace = false;

    for ch in segment.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                normalized.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            normalized.push(ch.to_ascii_lowercase());
        }
    }

    normalized
}

/// Build a normalised key scoped to `module_id`
pub fn create_cache_key(parts: CacheKeyParts<'_>, module_id: &str) -> CacheKey {
    let mut segments = vec![
        normalize_segment(module_id),
        normalize_segment(parts.namespace),
        normalize_segment(parts.resource),
    ];
    if let Some(identifier) = parts.identifier {
        segments.push(normalize_segment(identifier));
    }

    CacheKey(segments.join(&KEY_SEPARATOR.to_string()))
}

/// Key factory bound to one module and namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNamespace {
    module_id: String,
    namespace: String,
}

impl CacheNamespace {
    /// Create a new namespace; both names are normalised once here
    pub fn new(namespace: &str, module_id: &str) -> Self {
        Self {
            module_id: module_id.to_string(),
            namespace: normalize_segment(namespace),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key for a whole resource
    pub fn key(&self, resource: &str) -> CacheKey {
        create_cache_key(CacheKeyParts::new(&self.namespace, resource), &self.module_id)
    }

    /// Key for one item of a resource
    pub fn item_key(&self, resource: &str, identifier: impl fmt::Display) -> CacheKey {
        let identifier = identifier.to_string();
        create_cache_key(
            CacheKeyParts::new(&self.namespace, resource).with_identifier(&identifier),
            &self.module_id,
        )
    }

    /// Prefix shared by every key in this namespace, usable with
    /// [`CacheService::invalidate_where`](crate::CacheService::invalidate_where)
    pub fn prefix(&self) -> String {
        format!(
            "{}{sep}{}{sep}",
            normalize_segment(&self.module_id),
            self.namespace,
            sep = KEY_SEPARATOR
        )
    }
}
