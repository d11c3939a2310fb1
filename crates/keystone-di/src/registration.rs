//! Registration records
//!
//! Every registered token maps to exactly one [`ServiceRegistration`].
//! Class and factory registrations carry a type-erased constructor that
//! returns the instance together with an optional disposer hook.

use std::any::Any;
use std::sync::Arc;

use keystone_common::BoxError;
use serde::{Deserialize, Serialize};

use crate::injectable::{Dependencies, Disposable, Injectable};
use crate::lifecycle::ServiceLifecycle;
use crate::token::TokenKey;

/// Type-erased instance. The payload is always an `Arc<T>` so that unsized
/// services (trait objects) can be stored and recovered.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Teardown hook captured at construction time
pub(crate) type DisposeFn = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Type-erased constructor
pub(crate) type ConstructFn =
    Arc<dyn Fn(&Dependencies) -> Result<Constructed, BoxError> + Send + Sync>;

/// Output of a constructor call
pub(crate) struct Constructed {
    pub(crate) instance: Instance,
    pub(crate) disposer: Option<DisposeFn>,
}

/// Registration kind, for introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationKind {
    Class,
    Factory,
    Value,
    Alias,
}

/// Constructor plus its static dependency declaration
#[derive(Clone)]
pub(crate) struct ConstructorRegistration {
    pub(crate) construct: ConstructFn,
    pub(crate) dependencies: Vec<TokenKey>,
    pub(crate) lifecycle: ServiceLifecycle,
    pub(crate) type_name: &'static str,
}

/// A registration record
#[derive(Clone)]
pub(crate) enum ServiceRegistration {
    Class(ConstructorRegistration),
    Factory(ConstructorRegistration),
    Value {
        instance: Instance,
        type_name: &'static str,
    },
    Alias {
        target: TokenKey,
    },
}

impl ServiceRegistration {
    pub(crate) fn class<C: Injectable>(lifecycle: ServiceLifecycle) -> Self {
        let construct: ConstructFn = Arc::new(|deps: &Dependencies| {
            let service = Arc::new(C::construct(deps)?);
            let hook = Arc::clone(&service);
            let disposer: DisposeFn = Arc::new(move || Injectable::dispose(&*hook));
            Ok(Constructed {
                instance: Arc::new(service),
                disposer: Some(disposer),
            })
        });

        ServiceRegistration::Class(ConstructorRegistration {
            construct,
            dependencies: C::dependencies(),
            lifecycle,
            type_name: std::any::type_name::<C>(),
        })
    }

    pub(crate) fn factory<T, F>(
        factory: F,
        lifecycle: ServiceLifecycle,
        dependencies: Vec<TokenKey>,
    ) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let construct: ConstructFn = Arc::new(move |deps: &Dependencies| {
            let service = factory(deps)?;
            Ok(Constructed {
                instance: Arc::new(service),
                disposer: None,
            })
        });

        ServiceRegistration::Factory(ConstructorRegistration {
            construct,
            dependencies,
            lifecycle,
            type_name: std::any::type_name::<T>(),
        })
    }

    pub(crate) fn disposable_factory<T, F>(
        factory: F,
        lifecycle: ServiceLifecycle,
        dependencies: Vec<TokenKey>,
    ) -> Self
    where
        T: ?Sized + Disposable + Send + Sync + 'static,
        F: Fn(&Dependencies) -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        let construct: ConstructFn = Arc::new(move |deps: &Dependencies| {
            let service = factory(deps)?;
            let hook = Arc::clone(&service);
            let disposer: DisposeFn = Arc::new(move || Disposable::dispose(&*hook));
            Ok(Constructed {
                instance: Arc::new(service),
                disposer: Some(disposer),
            })
        });

        ServiceRegistration::Factory(ConstructorRegistration {
            construct,
            dependencies,
            lifecycle,
            type_name: std::any::type_name::<T>(),
        })
    }

    pub(crate) fn value<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        ServiceRegistration::Value {
            instance: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn kind(&self) -> RegistrationKind {
        match self {
            ServiceRegistration::Class(_) => RegistrationKind::Class,
            ServiceRegistration::Factory(_) => RegistrationKind::Factory,
            ServiceRegistration::Value { .. } => RegistrationKind::Value,
            ServiceRegistration::Alias { .. } => RegistrationKind::Alias,
        }
    }

    /// Values are implicitly singletons; aliases borrow their target's
    /// lifecycle and report `None`.
    pub(crate) fn lifecycle(&self) -> Option<ServiceLifecycle> {
        match self {
            ServiceRegistration::Class(c) | ServiceRegistration::Factory(c) => Some(c.lifecycle),
            ServiceRegistration::Value { .. } => Some(ServiceLifecycle::Singleton),
            ServiceRegistration::Alias { .. } => None,
        }
    }

    /// Outgoing edges in the dependency graph
    pub(crate) fn edges(&self) -> &[TokenKey] {
        match self {
            ServiceRegistration::Class(c) | ServiceRegistration::Factory(c) => &c.dependencies,
            ServiceRegistration::Value { .. } => &[],
            ServiceRegistration::Alias { target } => std::slice::from_ref(target),
        }
    }

    pub(crate) fn type_name(&self) -> Option<&'static str> {
        match self {
            ServiceRegistration::Class(c) | ServiceRegistration::Factory(c) => Some(c.type_name),
            ServiceRegistration::Value { type_name, .. } => Some(type_name),
            ServiceRegistration::Alias { .. } => None,
        }
    }
}

/// Values must be data, not callables. Rust has no runtime notion of
/// "is a function", so this inspects the outermost type in the name for
/// closures, function pointers and `Fn*` trait objects. Smart pointers and
/// references around a callable are looked through; callables nested in
/// generic arguments (a `Vec` of handlers, say) are data.
pub(crate) fn is_callable_type(type_name: &str) -> bool {
    let outer = peel_pointers(type_name);
    outer.starts_with("dyn core::ops::function::")
        || outer.starts_with("fn(")
        || outer.starts_with("unsafe fn(")
        || outer.starts_with("extern ")
        || outer.ends_with("{{closure}}")
}

fn peel_pointers(mut name: &str) -> &str {
    const WRAPPERS: [&str; 3] = ["alloc::boxed::Box<", "alloc::sync::Arc<", "alloc::rc::Rc<"];
    loop {
        if let Some(rest) = name.strip_prefix("&mut ").or_else(|| name.strip_prefix('&')) {
            name = rest;
            continue;
        }
        let unwrapped = WRAPPERS.iter().find_map(|wrapper| {
            name.strip_prefix(wrapper)?.strip_suffix('>')
        });
        match unwrapped {
            Some(inner) => name = inner,
            None => return name,
        }
    }
}

/// Describes one registered token, for diagnostics and health checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub token: String,
    pub kind: RegistrationKind,
    pub lifecycle: Option<ServiceLifecycle>,
    pub dependencies: Vec<String>,
    pub type_name: Option<String>,
}

impl RegistrationInfo {
    pub(crate) fn describe(key: &TokenKey, registration: &ServiceRegistration) -> Self {
        Self {
            token: key.description().to_string(),
            kind: registration.kind(),
            lifecycle: registration.lifecycle(),
            dependencies: registration
                .edges()
                .iter()
                .map(|k| k.description().to_string())
                .collect(),
            type_name: registration.type_name().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_name_of<T: ?Sized>() -> &'static str {
        std::any::type_name::<T>()
    }

    fn name_of_val<T>(_: &T) -> &'static str {
        std::any::type_name::<T>()
    }

    #[test]
    fn test_callable_detection() {
        let closure = || 1;
        assert!(is_callable_type(name_of_val(&closure)));
        assert!(is_callable_type(type_name_of::<fn() -> u8>()));
        assert!(is_callable_type(type_name_of::<dyn Fn(u8) -> u8 + Send + Sync>()));
        assert!(is_callable_type(type_name_of::<dyn FnMut()>()));
        assert!(is_callable_type(type_name_of::<Box<dyn Fn(u8) + Send + Sync>>()));
        assert!(is_callable_type(type_name_of::<std::sync::Arc<dyn Fn()>>()));
        assert!(is_callable_type(type_name_of::<&'static fn()>()));
    }

    #[test]
    fn test_data_types_are_not_callable() {
        assert!(!is_callable_type(type_name_of::<String>()));
        assert!(!is_callable_type(type_name_of::<Vec<u8>>()));
        assert!(!is_callable_type(type_name_of::<dyn std::fmt::Debug + Send + Sync>()));
        assert!(!is_callable_type(type_name_of::<keystone_common::KeystoneConfig>()));
        assert!(!is_callable_type(type_name_of::<Vec<Box<dyn Fn(u8) + Send + Sync>>>()));
        assert!(!is_callable_type(type_name_of::<Vec<fn(u8)>>()));
        assert!(!is_callable_type(type_name_of::<
            std::collections::HashMap<String, Box<dyn Fn() + Send + Sync>>,
        >()));
        assert!(!is_callable_type(type_name_of::<Option<fn()>>()));
    }
}
