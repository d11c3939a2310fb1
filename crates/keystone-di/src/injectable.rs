//! Constructor injection
//!
//! Services opt into class registration by implementing [`Injectable`]: a
//! static list of dependency tokens in constructor order plus a constructor
//! that receives those dependencies already resolved.
//!
//! ```rust
//! use std::sync::Arc;
//! use keystone_common::BoxError;
//! use keystone_di::{Dependencies, Injectable, Token, TokenKey};
//! use once_cell::sync::Lazy;
//!
//! pub struct Logger;
//!
//! pub struct ServiceA {
//!     logger: Arc<Logger>,
//! }
//!
//! static LOGGER: Lazy<Token<Logger>> = Lazy::new(|| Token::new("Logger"));
//!
//! impl Injectable for ServiceA {
//!     fn dependencies() -> Vec<TokenKey> {
//!         vec![LOGGER.key()]
//!     }
//!
//!     fn construct(deps: &Dependencies) -> Result<Self, BoxError> {
//!         Ok(Self { logger: deps.get(&*LOGGER)? })
//!     }
//! }
//! ```

use std::sync::Arc;

use keystone_common::BoxError;

use crate::error::{ContainerError, Result};
use crate::registration::Instance;
use crate::token::{Token, TokenKey};

/// A service constructed by the container from its declared dependencies
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Dependency tokens in constructor order
    fn dependencies() -> Vec<TokenKey>;

    /// Build the service from resolved dependencies
    fn construct(deps: &Dependencies) -> std::result::Result<Self, BoxError>;

    /// Release resources when the owning container is disposed
    fn dispose(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

/// A factory-built service that needs teardown when its container is
/// disposed
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> std::result::Result<(), BoxError>;
}

/// Resolved dependencies handed to a constructor or factory, in declaration
/// order
pub struct Dependencies {
    owner: TokenKey,
    resolved: Vec<(TokenKey, Instance)>,
}

impl Dependencies {
    pub(crate) fn new(owner: TokenKey, resolved: Vec<(TokenKey, Instance)>) -> Self {
        Self { owner, resolved }
    }

    /// Fetch a declared dependency by token
    pub fn get<T>(&self, token: &Token<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let (key, instance) = self
            .resolved
            .iter()
            .find(|(key, _)| key == token.key_ref())
            .ok_or_else(|| ContainerError::UndeclaredDependency {
                dependency: token.key(),
            })?;

        instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| ContainerError::TypeMismatch {
                token: key.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Token of the service being constructed
    pub fn owner(&self) -> &TokenKey {
        &self.owner
    }

    /// Declared dependency tokens in order
    pub fn keys(&self) -> impl Iterator<Item = &TokenKey> {
        self.resolved.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
