use std::sync::Arc;

use artemis_relay::bus::InMemoryBroker;
use artemis_relay::naming::{
    ContextEnvironment, ContextFactoryRegistry, InMemoryContextFactory, InitialContext,
    NamingError, StompContextFactory, STOMP_CONTEXT_FACTORY,
};

fn registry_with(legacy: &InMemoryBroker) -> ContextFactoryRegistry {
    let memory = InMemoryContextFactory::new();
    memory.bind("jms/ConnectionFactory", Arc::new(legacy.clone()));

    let stomp = Arc::new(StompContextFactory::default());
    let mut registry = ContextFactoryRegistry::new();
    registry
        .register("memory", Arc::new(memory))
        .register("stomp", stomp.clone())
        .register(STOMP_CONTEXT_FACTORY, stomp);
    registry
}

#[test]
fn looked_up_factory_reaches_the_bound_broker() {
    let legacy = InMemoryBroker::new();
    let registry = registry_with(&legacy);

    let env = ContextEnvironment::new("memory", "mem://legacy").with_credentials("weblogic", "pw");
    let context = InitialContext::new(env, &registry).unwrap();
    assert_eq!(context.environment().provider_url, "mem://legacy");

    let factory = context.lookup("jms/ConnectionFactory").unwrap();
    factory.sender().send("weblogic.input.queue", "via lookup").unwrap();

    assert_eq!(
        legacy.sent_to("weblogic.input.queue"),
        vec!["via lookup".to_string()]
    );
    assert_eq!(factory.describe(), "in-memory broker");
}

#[test]
fn unbound_names_and_unknown_factories_fail() {
    let registry = registry_with(&InMemoryBroker::new());

    let context =
        InitialContext::new(ContextEnvironment::new("memory", "mem://"), &registry).unwrap();
    assert!(matches!(
        context.lookup("jms/Nope"),
        Err(NamingError::NameNotFound(_))
    ));

    let env = ContextEnvironment::new("weblogic.jndi.WLInitialContextFactory", "t3://wls:7001");
    assert!(matches!(
        InitialContext::new(env, &registry),
        Err(NamingError::NoInitialContext(_))
    ));
}

#[test]
fn registry_lists_factory_names() {
    let registry = registry_with(&InMemoryBroker::new());
    assert_eq!(
        registry.names(),
        vec!["artemis_relay.naming.StompContextFactory", "memory", "stomp"]
    );
}

#[test]
fn later_bindings_are_visible_to_existing_contexts() {
    let memory = InMemoryContextFactory::new();
    let mut registry = ContextFactoryRegistry::new();
    registry.register("memory", Arc::new(memory.clone()));

    let context =
        InitialContext::new(ContextEnvironment::new("memory", "mem://"), &registry).unwrap();
    assert!(context.lookup("jms/Late").is_err());

    memory.bind("jms/Late", Arc::new(InMemoryBroker::new()));
    assert!(context.lookup("jms/Late").is_ok());

    assert!(memory.unbind("jms/Late"));
    assert!(context.lookup("jms/Late").is_err());
}
