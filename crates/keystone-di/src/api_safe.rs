//! API-safe tokens
//!
//! The panicking [`ServiceContainer::resolve`](crate::ServiceContainer::resolve)
//! entry point only accepts tokens that were explicitly branded for use
//! outside the trusted internal call graph. The brand has two halves: the
//! [`ApiSafeToken`] wrapper type, which can only be obtained from
//! [`mark_as_api_safe`], and a process-wide membership set checked at
//! runtime. Revoking a token removes it from the set while any wrappers
//! already handed out keep compiling.

use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::token::{Token, TokenKey};

static API_SAFE_TOKENS: Lazy<RwLock<HashSet<u64>>> = Lazy::new(|| RwLock::new(HashSet::new()));

/// A token branded as resolvable through the public entry point
pub struct ApiSafeToken<T: ?Sized> {
    token: Token<T>,
}

impl<T: ?Sized> ApiSafeToken<T> {
    /// The underlying token
    pub fn token(&self) -> &Token<T> {
        &self.token
    }

    /// Whether the runtime registry still lists this token
    pub fn is_marked(&self) -> bool {
        is_api_safe(self.token.key_ref())
    }
}

impl<T: ?Sized> Deref for ApiSafeToken<T> {
    type Target = Token<T>;

    fn deref(&self) -> &Token<T> {
        &self.token
    }
}

impl<T: ?Sized> Clone for ApiSafeToken<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ApiSafeToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSafeToken")
            .field("token", &self.token)
            .field("marked", &self.is_marked())
            .finish()
    }
}

/// Brand a token as API-safe
pub fn mark_as_api_safe<T: ?Sized>(token: Token<T>) -> ApiSafeToken<T> {
    API_SAFE_TOKENS.write().insert(token.id());
    debug!(token = %token.description(), "Marked token as API-safe");
    ApiSafeToken { token }
}

/// Whether a token is currently branded
pub fn is_api_safe(key: &TokenKey) -> bool {
    API_SAFE_TOKENS.read().contains(&key.id())
}

/// Withdraw a token from the public surface. Returns `false` if it was not
/// branded.
pub fn revoke_api_safe(key: &TokenKey) -> bool {
    let removed = API_SAFE_TOKENS.write().remove(&key.id());
    if removed {
        debug!(token = %key.description(), "Revoked API-safe token");
    }
    removed
}
