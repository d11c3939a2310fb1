//! Token → registration table owned by a single container

use std::collections::HashMap;

use crate::error::{ContainerError, Result};
use crate::registration::ServiceRegistration;
use crate::token::TokenKey;

/// Registration table preserving insertion order
pub(crate) struct ServiceRegistry {
    entries: HashMap<TokenKey, ServiceRegistration>,
    order: Vec<TokenKey>,
    max_registrations: usize,
}

impl ServiceRegistry {
    pub(crate) fn new(max_registrations: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            max_registrations,
        }
    }

    /// Insert a registration, rejecting duplicates and enforcing the cap
    pub(crate) fn insert(
        &mut self,
        scope: &str,
        key: TokenKey,
        registration: ServiceRegistration,
    ) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(ContainerError::TokenAlreadyRegistered { token: key });
        }
        if self.entries.len() >= self.max_registrations {
            return Err(ContainerError::MaxRegistrationsExceeded {
                scope: scope.to_string(),
                limit: self.max_registrations,
            });
        }

        self.order.push(key.clone());
        self.entries.insert(key, registration);
        Ok(())
    }

    pub(crate) fn get(&self, key: &TokenKey) -> Option<&ServiceRegistration> {
        self.entries.get(key)
    }

    pub(crate) fn contains(&self, key: &TokenKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Registrations in insertion order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&TokenKey, &ServiceRegistration)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|registration| (key, registration)))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
