//! Lifecycles and the container validation state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caching policy applied to a class or factory registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLifecycle {
    /// Created once and cached by the container that owns the registration
    Singleton,
    /// Created on every resolution, never cached
    Transient,
    /// Created once per scope; resolving from the root container is an error
    Scoped,
}

impl fmt::Display for ServiceLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceLifecycle::Singleton => "singleton",
            ServiceLifecycle::Transient => "transient",
            ServiceLifecycle::Scoped => "scoped",
        };
        f.write_str(name)
    }
}

/// One-way state machine gating registration and resolution.
///
/// `Registering → Validating → Validated`; a failed validation falls back
/// to `Registering` so bootstrap code can fix the registrations and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerValidationState {
    Registering,
    Validating,
    Validated,
}

impl ContainerValidationState {
    /// Registration calls are accepted
    pub fn accepts_registrations(&self) -> bool {
        matches!(self, ContainerValidationState::Registering)
    }

    /// Resolution calls are accepted
    pub fn accepts_resolutions(&self) -> bool {
        matches!(self, ContainerValidationState::Validated)
    }
}

impl fmt::Display for ContainerValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerValidationState::Registering => "registering",
            ContainerValidationState::Validating => "validating",
            ContainerValidationState::Validated => "validated",
        };
        f.write_str(name)
    }
}
