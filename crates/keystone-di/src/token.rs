//! Injection tokens
//!
//! A [`Token<T>`] stands in for "a service of type `T`". Its identity is a
//! process-unique number handed out at construction, so two tokens with the
//! same description are still different tokens. Tokens are usually declared
//! once as statics:
//!
//! ```rust
//! use keystone_di::Token;
//! use once_cell::sync::Lazy;
//!
//! struct Logger;
//!
//! static LOGGER: Lazy<Token<Logger>> = Lazy::new(|| Token::new("Logger"));
//!
//! assert_eq!(LOGGER.description(), "Logger");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Untyped token identity used in dependency lists and diagnostics.
///
/// Equality, ordering and hashing use the numeric id only.
#[derive(Clone)]
pub struct TokenKey {
    id: u64,
    description: Arc<str>,
}

impl TokenKey {
    fn allocate(description: Arc<str>) -> Self {
        Self {
            id: NEXT_TOKEN_ID.fetch_add(1, AtomicOrdering::Relaxed),
            description,
        }
    }

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for TokenKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TokenKey {}

impl Hash for TokenKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TokenKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKey({}#{})", self.description, self.id)
    }
}

/// Typed handle for a service of type `T`.
///
/// `T` may be unsized, so trait objects can be registered under a
/// `Token<dyn Capability>`.
pub struct Token<T: ?Sized> {
    key: TokenKey,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized> Token<T> {
    /// Create a new token with a fresh identity
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            key: TokenKey::allocate(description.into()),
            _marker: PhantomData,
        }
    }

    /// Untyped identity, for dependency declarations
    pub fn key(&self) -> TokenKey {
        self.key.clone()
    }

    /// Borrow the untyped identity
    pub fn key_ref(&self) -> &TokenKey {
        &self.key
    }

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.key.id
    }

    /// Human-readable description
    pub fn description(&self) -> &str {
        self.key.description()
    }
}

impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T: ?Sized> Eq for Token<T> {}

impl<T: ?Sized> Hash for Token<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token<{}>({}#{})", std::any::type_name::<T>(), self.key.description, self.key.id)
    }
}

impl<T: ?Sized> fmt::Display for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl<T: ?Sized> From<&Token<T>> for TokenKey {
    fn from(token: &Token<T>) -> Self {
        token.key()
    }
}
