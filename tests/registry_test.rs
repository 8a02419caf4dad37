//! Handler registry behaviour through the public API

use std::sync::Arc;

use topicbus::dispatch::{CallbackDispatcher, DispatchTarget, TargetKind};
use topicbus::messaging::{Headers, JsonCodec};
use topicbus::registry::{is_wildcard_expression, HandlerRegistry, RegistryError};

fn target() -> DispatchTarget {
    let dispatcher = CallbackDispatcher::from_sync(JsonCodec, |_: serde_json::Value| {
        Ok::<_, std::io::Error>(())
    });
    DispatchTarget::new(TargetKind::Callback, Arc::new(dispatcher))
}

fn resolves_to(registry: &HandlerRegistry, routing_key: &str, expected: &DispatchTarget) -> bool {
    registry
        .resolve(routing_key, &Headers::new())
        .is_some_and(|found| Arc::ptr_eq(found.dispatcher(), expected.dispatcher()))
}

#[test]
fn test_topics_and_patterns_keep_registration_order() {
    let mut registry = HandlerRegistry::new();
    registry.register_exact("orders.updated", target()).unwrap();
    registry.register_wildcard("invoices.#", target()).unwrap();
    registry.register_exact("orders.created", target()).unwrap();
    registry.register_wildcard("orders.*", target()).unwrap();

    assert_eq!(registry.topics(), vec!["orders.updated", "orders.created"]);
    assert_eq!(registry.wildcard_patterns(), vec!["invoices.#", "orders.*"]);
    assert_eq!(registry.len(), 4);
}

#[test]
fn test_exact_precedence_regardless_of_registration_order() {
    let mut registry = HandlerRegistry::new();
    let wildcard = target();
    let exact = target();
    registry.register_wildcard("orders.#", wildcard.clone()).unwrap();
    registry.register_exact("orders.created", exact.clone()).unwrap();

    assert!(resolves_to(&registry, "orders.created", &exact));
    assert!(resolves_to(&registry, "orders.created.eu", &wildcard));
}

#[test]
fn test_overlapping_wildcards_resolve_in_registration_order() {
    let mut registry = HandlerRegistry::new();
    let specific = target();
    let broad = target();
    registry.register_wildcard("orders.*.eu", specific.clone()).unwrap();
    registry.register_wildcard("orders.#", broad.clone()).unwrap();

    assert!(resolves_to(&registry, "orders.created.eu", &specific));
    assert!(resolves_to(&registry, "orders.created.us", &broad));
}

#[test]
fn test_duplicate_wildcard_keeps_both_and_first_wins() {
    let mut registry = HandlerRegistry::new();
    let first = target();
    let second = target();
    registry.register_wildcard("orders.*", first.clone()).unwrap();
    registry.register_wildcard("orders.*", second.clone()).unwrap();

    assert_eq!(registry.wildcard_bindings().len(), 2);
    assert!(resolves_to(&registry, "orders.created", &first));
    assert!(Arc::ptr_eq(
        registry.wildcard_bindings()[1].target().dispatcher(),
        second.dispatcher()
    ));
}

#[test]
fn test_duplicate_exact_topic_is_a_registration_error() {
    let mut registry = HandlerRegistry::new();
    registry.register_exact("orders.created", target()).unwrap();

    let err = registry.register_exact("orders.created", target()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Topic 'orders.created' is already bound to a handler"
    );
    assert!(matches!(err, RegistryError::DuplicateTopicBinding { .. }));
}

#[test]
fn test_unbound_key_resolves_to_nothing() {
    let mut registry = HandlerRegistry::new();
    registry.register_exact("orders.created", target()).unwrap();
    registry.register_wildcard("orders.*", target()).unwrap();

    assert!(registry.resolve("orders", &Headers::new()).is_none());
    assert!(registry.resolve("shipments.sent", &Headers::new()).is_none());
    assert!(registry.resolve("", &Headers::new()).is_none());
}

#[test]
fn test_wildcard_expressions_belong_in_the_pattern_list() {
    let mut registry = HandlerRegistry::new();

    for expression in ["orders.created", "orders.*", "audit.#"] {
        if is_wildcard_expression(expression) {
            registry.register_wildcard(expression, target()).unwrap();
        } else {
            registry.register_exact(expression, target()).unwrap();
        }
    }
    assert_eq!(registry.topics(), vec!["orders.created"]);
    assert_eq!(registry.wildcard_patterns(), vec!["orders.*", "audit.#"]);

    let err = registry.register_exact("orders.#", target()).unwrap_err();
    assert_eq!(
        err,
        RegistryError::invalid_topic("orders.#", "wildcards are only allowed in patterns")
    );
}
