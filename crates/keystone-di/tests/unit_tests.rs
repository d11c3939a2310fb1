//! Unit tests for registration, validation and resolution
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keystone_common::{BoxError, ContainerConfig};
use keystone_di::*;

#[derive(Debug, PartialEq)]
struct TestService {
    value: i32,
}

fn validated(container: &ServiceContainer) {
    container.validate().expect("container should validate");
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_duplicate_registration_rejected() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("TestService");

    container.register_instance(&token, TestService { value: 1 }).unwrap();
    let err = container
        .register_instance(&token, TestService { value: 2 })
        .unwrap_err();

    assert_eq!(err.code(), ContainerErrorCode::TokenAlreadyRegistered);
    assert_eq!(container.registered_count(), 1);
}

#[test]
fn test_callable_value_rejected() {
    let container = ServiceContainer::new();
    let token = Token::<dyn Fn() -> u32 + Send + Sync>::new("Callback");
    let callback: Arc<dyn Fn() -> u32 + Send + Sync> = Arc::new(|| 42);

    let err = container.register_value(&token, callback).unwrap_err();
    assert!(matches!(err, ContainerError::InvalidValueRegistration { .. }));
    assert!(!container.is_registered(&token));
}

#[test]
fn test_handler_table_value_accepted() {
    type Handlers = Vec<Box<dyn Fn(u8) + Send + Sync>>;

    let container = ServiceContainer::new();
    let token = Token::<Handlers>::new("Handlers");
    let handlers: Handlers = vec![Box::new(|_| {}), Box::new(|_| {})];

    container.register_instance(&token, handlers).unwrap();
    container
        .register_instance(&Token::<Vec<fn(u8)>>::new("Hooks"), Vec::new())
        .unwrap();
    validated(&container);

    assert_eq!(container.resolve_with_error(&token).unwrap().len(), 2);
}

#[test]
fn test_self_alias_rejected() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("TestService");

    let err = container.register_alias(&token, &token).unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::InvalidOperation);
}

#[test]
fn test_registration_after_validation_rejected() {
    let container = ServiceContainer::new();
    validated(&container);

    let err = container
        .register_instance(&Token::<i32>::new("Late"), 1)
        .unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::InvalidOperation);
}

#[test]
fn test_max_registrations_enforced() {
    let container = ServiceContainer::builder()
        .config(ContainerConfig {
            max_registrations: 2,
            ..ContainerConfig::default()
        })
        .build()
        .unwrap();

    container.register_instance(&Token::<i32>::new("One"), 1).unwrap();
    container.register_instance(&Token::<i32>::new("Two"), 2).unwrap();
    let err = container
        .register_instance(&Token::<i32>::new("Three"), 3)
        .unwrap_err();

    assert!(matches!(
        err,
        ContainerError::MaxRegistrationsExceeded { limit: 2, .. }
    ));
}

#[test]
fn test_get_registered_value_before_validation() {
    let container = ServiceContainer::new();
    let token = Token::<String>::new("Setting");
    container.register_instance(&token, "on".to_string()).unwrap();

    assert_eq!(container.get_registered_value(&token).as_deref().map(String::as_str), Some("on"));
    assert_eq!(container.validation_state(), ContainerValidationState::Registering);
}

#[test]
fn test_registrations_introspection() {
    let container = ServiceContainer::new();
    let base = Token::<i32>::new("Base");
    let derived = Token::<i32>::new("Derived");
    let alias = Token::<i32>::new("DerivedAlias");

    container.register_instance(&base, 1).unwrap();
    let dep = base.clone();
    container
        .register_factory(
            &derived,
            move |deps| Ok(Arc::new(*deps.get(&dep)? + 1)),
            ServiceLifecycle::Transient,
            vec![base.key()],
        )
        .unwrap();
    container.register_alias(&alias, &derived).unwrap();

    let infos = container.registrations();
    assert_eq!(infos.len(), 3);
    assert_eq!(infos[0].kind, RegistrationKind::Value);
    assert_eq!(infos[0].lifecycle, Some(ServiceLifecycle::Singleton));
    assert_eq!(infos[1].kind, RegistrationKind::Factory);
    assert_eq!(infos[1].dependencies, vec!["Base".to_string()]);
    assert_eq!(infos[2].kind, RegistrationKind::Alias);
    assert_eq!(infos[2].lifecycle, None);

    assert_eq!(container.registration_kind(&alias), Some(RegistrationKind::Alias));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validation_is_idempotent() {
    let container = ServiceContainer::new();
    container.register_instance(&Token::<i32>::new("One"), 1).unwrap();

    assert!(container.validate().is_ok());
    assert!(container.validate().is_ok());
    assert_eq!(container.validation_state(), ContainerValidationState::Validated);
}

#[test]
fn test_failed_validation_returns_to_registering() {
    let container = ServiceContainer::new();
    let x = Token::<i32>::new("ServiceX");
    let y = Token::<i32>::new("ServiceY");

    container
        .register_factory(&x, |_| Ok(Arc::new(1)), ServiceLifecycle::Singleton, vec![y.key()])
        .unwrap();

    let errors = container.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        ContainerError::DependencyNotRegistered { dependency, required_by }
            if *dependency == y.key() && *required_by == x.key()
    ));
    assert_eq!(container.validation_state(), ContainerValidationState::Registering);

    // Fixing the graph lets validation succeed
    container.register_instance(&y, 2).unwrap();
    assert!(container.validate().is_ok());
}

#[test]
fn test_cycle_reported_with_path() {
    let container = ServiceContainer::new();
    let a = Token::<i32>::new("A");
    let b = Token::<i32>::new("B");

    container
        .register_factory(&a, |_| Ok(Arc::new(1)), ServiceLifecycle::Singleton, vec![b.key()])
        .unwrap();
    container
        .register_factory(&b, |_| Ok(Arc::new(2)), ServiceLifecycle::Singleton, vec![a.key()])
        .unwrap();

    let errors = container.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    let path = errors[0].cycle_path().expect("cycle error");
    assert_eq!(path.first(), path.last());
    assert_eq!(path.len(), 3);
    assert!(errors[0].to_string().contains(" → "));
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_resolve_before_validation_fails() {
    let container = ServiceContainer::new();
    let token = Token::<i32>::new("Number");
    container.register_instance(&token, 5).unwrap();

    let err = container.resolve_with_error(&token).unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::NotValidated);
}

#[test]
fn test_unregistered_token() {
    let container = ServiceContainer::new();
    validated(&container);

    let err = container
        .resolve_with_error(&Token::<i32>::new("Missing"))
        .unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::TokenNotRegistered);
}

#[test]
fn test_singleton_returns_same_instance() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("TestService");
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    container
        .register_factory(
            &token,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(TestService { value: 42 }))
            },
            ServiceLifecycle::Singleton,
            vec![],
        )
        .unwrap();
    validated(&container);

    let first = container.resolve_with_error(&token).unwrap();
    let second = container.resolve_with_error(&token).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_returns_fresh_instances() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("TestService");

    container
        .register_factory(
            &token,
            |_| Ok(Arc::new(TestService { value: 7 })),
            ServiceLifecycle::Transient,
            vec![],
        )
        .unwrap();
    validated(&container);

    let first = container.resolve_with_error(&token).unwrap();
    let second = container.resolve_with_error(&token).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[test]
fn test_scoped_requires_scope() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("RequestState");

    container
        .register_factory(
            &token,
            |_| Ok(Arc::new(TestService { value: 0 })),
            ServiceLifecycle::Scoped,
            vec![],
        )
        .unwrap();
    validated(&container);

    let err = container.resolve_with_error(&token).unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::ScopeRequired);
}

#[test]
fn test_alias_resolves_target_instance() {
    let container = ServiceContainer::new();
    let target = Token::<TestService>::new("Target");
    let alias = Token::<TestService>::new("Alias");

    container
        .register_factory(
            &target,
            |_| Ok(Arc::new(TestService { value: 3 })),
            ServiceLifecycle::Singleton,
            vec![],
        )
        .unwrap();
    container.register_alias(&alias, &target).unwrap();
    validated(&container);

    let via_alias = container.resolve_with_error(&alias).unwrap();
    let direct = container.resolve_with_error(&target).unwrap();
    assert!(Arc::ptr_eq(&via_alias, &direct));
}

#[test]
fn test_trait_object_resolution() {
    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    let container = ServiceContainer::new();
    let token = Token::<dyn Greeter>::new("Greeter");
    let english: Arc<dyn Greeter> = Arc::new(English);
    container.register_value(&token, english).unwrap();
    validated(&container);

    let greeter = container.resolve_with_error(&token).unwrap();
    assert_eq!(greeter.greet(), "hello");
}

#[test]
fn test_factory_error_wrapped() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("Broken");

    container
        .register_factory(
            &token,
            |_| -> std::result::Result<Arc<TestService>, BoxError> { Err("database offline".into()) },
            ServiceLifecycle::Singleton,
            vec![],
        )
        .unwrap();
    validated(&container);

    let err = container.resolve_with_error(&token).unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::FactoryFailed);
    assert!(err.to_string().contains("database offline"));
}

#[test]
fn test_factory_panic_becomes_error() {
    let container = ServiceContainer::new();
    let token = Token::<TestService>::new("Panicky");

    container
        .register_factory(
            &token,
            |_| -> std::result::Result<Arc<TestService>, BoxError> { panic!("boom") },
            ServiceLifecycle::Transient,
            vec![],
        )
        .unwrap();
    validated(&container);

    let err = container.resolve_with_error(&token).unwrap_err();
    match err {
        ContainerError::FactoryFailed { source, .. } => {
            assert!(source.to_string().contains("boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_undeclared_dependency_in_factory() {
    let container = ServiceContainer::new();
    let hidden = Token::<i32>::new("Hidden");
    let consumer = Token::<i32>::new("Consumer");

    container.register_instance(&hidden, 1).unwrap();
    let sneaky = hidden.clone();
    container
        .register_factory(
            &consumer,
            move |deps| Ok(deps.get(&sneaky)?),
            ServiceLifecycle::Transient,
            vec![],
        )
        .unwrap();
    validated(&container);

    let err = container.resolve_with_error(&consumer).unwrap_err();
    match err {
        ContainerError::FactoryFailed { source, .. } => {
            let inner = source
                .downcast_ref::<ContainerError>()
                .expect("container error source");
            assert_eq!(inner.code(), ContainerErrorCode::UndeclaredDependency);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// API boundary
// ============================================================================

#[test]
fn test_resolve_api_safe_token() {
    let container = ServiceContainer::new();
    let token = mark_as_api_safe(Token::<TestService>::new("PublicService"));

    container
        .register_instance(token.token(), TestService { value: 9 })
        .unwrap();
    validated(&container);

    assert_eq!(container.resolve(&token).value, 9);
    assert_eq!(container.try_resolve(&token).unwrap().value, 9);
}

#[test]
fn test_revoked_token_is_boundary_violation() {
    let container = ServiceContainer::new();
    let token = mark_as_api_safe(Token::<TestService>::new("RevokedService"));

    container
        .register_instance(token.token(), TestService { value: 1 })
        .unwrap();
    validated(&container);

    assert!(revoke_api_safe(token.key_ref()));
    let err = container.try_resolve(&token).unwrap_err();
    assert_eq!(err.code(), ContainerErrorCode::ApiBoundaryViolation);
}

#[test]
#[should_panic(expected = "API boundary violation")]
fn test_resolve_panics_on_revoked_token() {
    let container = ServiceContainer::new();
    let token = mark_as_api_safe(Token::<TestService>::new("PanickingService"));
    container
        .register_instance(token.token(), TestService { value: 1 })
        .unwrap();
    validated(&container);

    revoke_api_safe(token.key_ref());
    let _ = container.resolve(&token);
}

#[test]
#[should_panic(expected = "Token not registered")]
fn test_resolve_panics_on_failure() {
    let container = ServiceContainer::new();
    validated(&container);

    let token = mark_as_api_safe(Token::<TestService>::new("NeverRegistered"));
    let _ = container.resolve(&token);
}

// ============================================================================
// Core services
// ============================================================================

#[test]
fn test_core_services_registered() {
    let config = keystone_common::KeystoneConfig::default();
    let container = ServiceContainer::builder()
        .with_core_services(config.clone())
        .build()
        .unwrap();
    validated(&container);

    let resolved = container.resolve_with_error(&*KEYSTONE_CONFIG).unwrap();
    assert_eq!(*resolved, config);
    assert!(container.resolve_with_error(&*METRICS_COLLECTOR).is_ok());
}

#[test]
fn test_health_snapshot() {
    let container = ServiceContainer::builder().name("app").build().unwrap();
    container.register_instance(&Token::<i32>::new("One"), 1).unwrap();
    validated(&container);
    let _scope = container.create_scope(Some("request")).unwrap();

    let health = container.health();
    assert_eq!(health.scope, "app");
    assert_eq!(health.registrations, 1);
    assert_eq!(health.live_scopes, 1);
    assert!(!health.disposed);
    assert!(serde_json::to_string(&health).unwrap().contains("\"validated\""));
}
