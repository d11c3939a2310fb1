//! Container error taxonomy

use keystone_common::BoxError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::TokenKey;

/// Result type for container operations
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that can occur during registration, validation, resolution and
/// disposal
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Token already registered: {token}")]
    TokenAlreadyRegistered { token: TokenKey },

    #[error("Invalid value registration for {token}: {type_name} is callable, register it as a factory instead")]
    InvalidValueRegistration {
        token: TokenKey,
        type_name: &'static str,
    },

    #[error("Alias {alias} targets unregistered token {target}")]
    AliasTargetMissing { alias: TokenKey, target: TokenKey },

    #[error("Dependency not registered: {dependency} (required by {required_by})")]
    DependencyNotRegistered {
        dependency: TokenKey,
        required_by: TokenKey,
    },

    #[error("Circular dependency detected: {}", format_path(path))]
    CircularDependencyDetected { path: Vec<TokenKey> },

    #[error("Token not registered: {token}")]
    TokenNotRegistered { token: TokenKey },

    #[error("Container '{scope}' has not been validated (state: {state})")]
    NotValidated { scope: String, state: String },

    #[error("Scoped service {token} cannot be resolved outside a scope")]
    ScopeRequired { token: TokenKey },

    #[error("Factory for {token} failed: {source}")]
    FactoryFailed {
        token: TokenKey,
        #[source]
        source: BoxError,
    },

    #[error("Container '{scope}' has been disposed")]
    Disposed { scope: String },

    #[error("API boundary violation: token {token} is not marked as API-safe")]
    ApiBoundaryViolation { token: TokenKey },

    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation { operation: String, reason: String },

    #[error("Maximum registrations exceeded: container '{scope}' allows {limit}")]
    MaxRegistrationsExceeded { scope: String, limit: usize },

    #[error("Maximum scope depth exceeded: scope '{scope}' cannot nest deeper than {limit}")]
    MaxScopeDepthExceeded { scope: String, limit: usize },

    #[error("Type mismatch for {token}: expected {expected}")]
    TypeMismatch {
        token: TokenKey,
        expected: &'static str,
    },

    #[error("Dependency {dependency} was not declared by the service being constructed")]
    UndeclaredDependency { dependency: TokenKey },

    #[error("Disposal of {token} in '{scope}' failed: {source}")]
    DisposalFailed {
        scope: String,
        token: TokenKey,
        #[source]
        source: BoxError,
    },

    #[error("Disposal completed with {} failure(s)", failures.len())]
    PartialDisposal { failures: Vec<ContainerError> },

    #[error("Container validation failed with {} error(s): {}", errors.len(), format_errors(errors))]
    ValidationFailed { errors: Vec<ContainerError> },
}

/// Stable, copyable discriminant of a [`ContainerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerErrorCode {
    TokenAlreadyRegistered,
    InvalidValueRegistration,
    AliasTargetMissing,
    DependencyNotRegistered,
    CircularDependencyDetected,
    TokenNotRegistered,
    NotValidated,
    ScopeRequired,
    FactoryFailed,
    Disposed,
    ApiBoundaryViolation,
    InvalidOperation,
    MaxRegistrationsExceeded,
    MaxScopeDepthExceeded,
    TypeMismatch,
    UndeclaredDependency,
    DisposalFailed,
    PartialDisposal,
    ValidationFailed,
}

impl ContainerError {
    /// Error code for matching and metrics
    pub fn code(&self) -> ContainerErrorCode {
        match self {
            ContainerError::TokenAlreadyRegistered { .. } => ContainerErrorCode::TokenAlreadyRegistered,
            ContainerError::InvalidValueRegistration { .. } => ContainerErrorCode::InvalidValueRegistration,
            ContainerError::AliasTargetMissing { .. } => ContainerErrorCode::AliasTargetMissing,
            ContainerError::DependencyNotRegistered { .. } => ContainerErrorCode::DependencyNotRegistered,
            ContainerError::CircularDependencyDetected { .. } => ContainerErrorCode::CircularDependencyDetected,
            ContainerError::TokenNotRegistered { .. } => ContainerErrorCode::TokenNotRegistered,
            ContainerError::NotValidated { .. } => ContainerErrorCode::NotValidated,
            ContainerError::ScopeRequired { .. } => ContainerErrorCode::ScopeRequired,
            ContainerError::FactoryFailed { .. } => ContainerErrorCode::FactoryFailed,
            ContainerError::Disposed { .. } => ContainerErrorCode::Disposed,
            ContainerError::ApiBoundaryViolation { .. } => ContainerErrorCode::ApiBoundaryViolation,
            ContainerError::InvalidOperation { .. } => ContainerErrorCode::InvalidOperation,
            ContainerError::MaxRegistrationsExceeded { .. } => ContainerErrorCode::MaxRegistrationsExceeded,
            ContainerError::MaxScopeDepthExceeded { .. } => ContainerErrorCode::MaxScopeDepthExceeded,
            ContainerError::TypeMismatch { .. } => ContainerErrorCode::TypeMismatch,
            ContainerError::UndeclaredDependency { .. } => ContainerErrorCode::UndeclaredDependency,
            ContainerError::DisposalFailed { .. } => ContainerErrorCode::DisposalFailed,
            ContainerError::PartialDisposal { .. } => ContainerErrorCode::PartialDisposal,
            ContainerError::ValidationFailed { .. } => ContainerErrorCode::ValidationFailed,
        }
    }

    /// Cycle path for [`ContainerError::CircularDependencyDetected`]
    pub fn cycle_path(&self) -> Option<&[TokenKey]> {
        match self {
            ContainerError::CircularDependencyDetected { path } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn invalid_operation(operation: &str, reason: impl Into<String>) -> Self {
        ContainerError::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Panic raised inside a user factory or disposer, surfaced as an error
#[derive(Debug, Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    pub message: String,
}

impl PanicError {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

fn format_path(path: &[TokenKey]) -> String {
    path.iter()
        .map(|key| key.description())
        .collect::<Vec<_>>()
        .join(" → ")
}

fn format_errors(errors: &[ContainerError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
