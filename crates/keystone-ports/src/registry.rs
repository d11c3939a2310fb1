//! Version-indexed adapter table

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use keystone_common::BoxError;
use keystone_di::{ServiceContainer, Token};
use tracing::debug;

use crate::error::{PortError, Result};

/// Builds an adapter directly from the container, bypassing token resolution
pub type PortFactory<T> =
    Arc<dyn Fn(&ServiceContainer) -> std::result::Result<Arc<T>, BoxError> + Send + Sync>;

/// How the implementation for one version is obtained
pub enum PortSource<T: ?Sized> {
    /// Resolve this token through the container
    Token(Token<T>),
    /// Call this factory
    Factory(PortFactory<T>),
}

impl<T: ?Sized> Clone for PortSource<T> {
    fn clone(&self) -> Self {
        match self {
            PortSource::Token(token) => PortSource::Token(token.clone()),
            PortSource::Factory(factory) => PortSource::Factory(Arc::clone(factory)),
        }
    }
}

impl<T: ?Sized> fmt::Debug for PortSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSource::Token(token) => f.debug_tuple("Token").field(token).finish(),
            PortSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Implementations of one capability, keyed by host major version
pub struct PortRegistry<T: ?Sized> {
    name: String,
    entries: BTreeMap<u32, PortSource<T>>,
}

impl<T: ?Sized> PortRegistry<T> {
    /// Create an empty registry for the named port
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Port name used in errors, events and logs
    pub fn name(&self) -> &str {
        &self.name
    }

    fn insert(&mut self, version: u32, source: PortSource<T>) -> Result<()> {
        if self.entries.contains_key(&version) {
            return Err(PortError::DuplicateVersion {
                port: self.name.clone(),
                version,
            });
        }
        debug!(port = %self.name, version, source = ?source, "Registered port implementation");
        self.entries.insert(version, source);
        Ok(())
    }

    /// Resolve `token` through the container when `version` is selected
    pub fn register(&mut self, version: u32, token: Token<T>) -> Result<()> {
        self.insert(version, PortSource::Token(token))
    }

    /// Call `factory` when `version` is selected
    pub fn register_factory<F>(&mut self, version: u32, factory: F) -> Result<()>
    where
        F: Fn(&ServiceContainer) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.insert(version, PortSource::Factory(Arc::new(factory)))
    }

    /// Registered versions in ascending order
    pub fn available_versions(&self) -> Vec<u32> {
        self.entries.keys().copied().collect()
    }

    pub fn has_version(&self, version: u32) -> bool {
        self.entries.contains_key(&version)
    }

    pub fn highest_version(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// Implementation registered for exactly `version`
    pub fn get(&self, version: u32) -> Option<&PortSource<T>> {
        self.entries.get(&version)
    }

    /// Copy of the token entries, ascending by version. Factory entries are
    /// left out.
    pub fn tokens(&self) -> BTreeMap<u32, Token<T>> {
        self.entries
            .iter()
            .filter_map(|(version, source)| match source {
                PortSource::Token(token) => Some((*version, token.clone())),
                PortSource::Factory(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized> fmt::Debug for PortRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortRegistry")
            .field("name", &self.name)
            .field("versions", &self.available_versions())
            .finish()
    }
}
