//! Integration tests for Listener binding and execution isolation
//!
//! These tests cover:
//! - Method resolution for single and multiple events
//! - Binding, unbinding and the enabled flag
//! - Failure isolation for synchronous, asynchronous and panicking handlers
//! - Emitter resolution through the owning handler
//! - End-to-end loading from a directory through ListenerHandler

use async_trait::async_trait;
use bridge_desktop::FsSourceDiscovery;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::SourceDiscovery;
use core_components::{
    Capability, Client, Component, ComponentDefaults, ComponentError, ComponentStore, Deferred,
    EmitterRef, HandlerEvent, Listener, ListenerDefinition, ListenerFailure, ListenerHandler,
    ListenerOwner, LoadOutcome, RegistryResolver, StoreEvent, StoreOptions,
};
use core_runtime::config::RuntimeConfig;
use core_runtime::events::{Callback, Emitter, EventSource};
use mockall::mock;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mock! {
    pub Owner {}

    impl ListenerOwner for Owner {
        fn emitter(&self, key: &str) -> Option<Arc<dyn EventSource>>;
        fn notify(&self, event: HandlerEvent);
    }
}

struct NoSources;

#[async_trait]
impl SourceDiscovery for NoSources {
    async fn discover(&self, _store: &str) -> BridgeResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

fn client() -> Arc<Client> {
    let config = RuntimeConfig::builder()
        .base_directory("components")
        .discovery(Arc::new(NoSources))
        .build()
        .unwrap();
    Client::new(config)
}

fn listener_store(client: Arc<Client>) -> Arc<ComponentStore<Listener>> {
    ComponentStore::new(
        client,
        "listeners",
        Arc::new(RegistryResolver::<Listener>::new()),
        StoreOptions::default().with_class_to_handle(Capability::LISTENER),
    )
}

fn handler() -> (Arc<Client>, Arc<ListenerHandler>) {
    let client = client();
    let handler =
        ListenerHandler::new(client.clone(), Arc::new(RegistryResolver::<Listener>::new()));
    (client, handler)
}

fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(&[Value]) -> Deferred + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    move |_: &[Value]| {
        counter.fetch_add(1, Ordering::SeqCst);
        Deferred::done()
    }
}

fn recording(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
) -> impl Fn(&[Value]) -> Deferred + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |_: &[Value]| {
        log.lock().unwrap().push(name);
        Deferred::done()
    }
}

async fn next_event(events: &mut core_runtime::events::Receiver<HandlerEvent>) -> HandlerEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for a handler event")
        .expect("handler event bus closed")
}

#[test]
fn test_single_event_uses_run_for_every_fire() {
    let emitter = Arc::new(Emitter::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let store = listener_store(client());

    let definition = ListenerDefinition::new("ready", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(counting(&runs));
    let listener = Listener::new(&store, &definition).unwrap();

    listener.listen().unwrap();

    assert_eq!(emitter.listener_count("ready"), 1);
    emitter.emit("ready", &[]);
    emitter.emit("ready", &[]);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_map_overrides_conventional_method() {
    let emitter = Arc::new(Emitter::new());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let store = listener_store(client());

    let definition = ListenerDefinition::new("multi", ["a", "b"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .map("b", "onBravo")
        .method("onA", recording(&calls, "onA"))
        .method("onB", recording(&calls, "onB"))
        .method("onBravo", recording(&calls, "onBravo"));
    let listener = Listener::new(&store, &definition).unwrap();
    listener.listen().unwrap();

    emitter.emit("a", &[]);
    emitter.emit("b", &[]);

    assert_eq!(*calls.lock().unwrap(), vec!["onA", "onBravo"]);
}

#[test]
fn test_missing_method_fails_construction() {
    let store = listener_store(client());
    let definition =
        ListenerDefinition::new("multi", ["a", "b"]).method("onA", |_| Deferred::done());

    let err = Listener::new(&store, &definition).unwrap_err();

    assert!(matches!(err, ComponentError::MissingMethod { ref method, .. } if method == "onB"));
    assert!(store.is_empty());
}

#[test]
fn test_empty_event_list_is_rejected() {
    let store = listener_store(client());
    let definition = ListenerDefinition::new("idle", Vec::<String>::new());

    let err = Listener::new(&store, &definition).unwrap_err();
    assert!(matches!(err, ComponentError::InvalidConfig { .. }));
}

#[test]
fn test_unlisten_stops_every_event_and_keeps_other_subscribers() {
    let emitter = Arc::new(Emitter::new());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let outsider_runs = Arc::new(AtomicUsize::new(0));
    let store = listener_store(client());

    let outsider_counter = outsider_runs.clone();
    let outsider: Callback = Arc::new(move |_| {
        outsider_counter.fetch_add(1, Ordering::SeqCst);
    });
    emitter.on("a", outsider);

    let definition = ListenerDefinition::new("multi", ["a", "b"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .method("onA", recording(&calls, "onA"))
        .method("onB", recording(&calls, "onB"));
    let listener = Listener::new(&store, &definition).unwrap();

    listener.listen().unwrap();
    assert!(listener.is_bound());
    assert_eq!(listener.unlisten(), 2);
    assert!(!listener.is_bound());

    emitter.emit("a", &[]);
    emitter.emit("b", &[]);

    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(emitter.listener_count("a"), 1);
    assert_eq!(emitter.listener_count("b"), 0);
    assert_eq!(outsider_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unlisten_on_unbound_listener_is_noop() {
    let store = listener_store(client());
    let listener = Listener::new(&store, &ListenerDefinition::new("ready", ["ready"])).unwrap();

    assert_eq!(listener.unlisten(), 0);
    assert_eq!(listener.unlisten(), 0);
}

#[test]
fn test_listen_twice_binds_once() {
    let emitter = Arc::new(Emitter::new());
    let store = listener_store(client());
    let definition =
        ListenerDefinition::new("ready", ["ready"]).emitter(EmitterRef::Source(emitter.clone()));
    let listener = Listener::new(&store, &definition).unwrap();

    listener.listen().unwrap();
    listener.listen().unwrap();

    assert_eq!(emitter.listener_count("ready"), 1);
}

#[test]
fn test_disabled_listener_makes_no_subscriptions() {
    let emitter = Arc::new(Emitter::new());
    let store = listener_store(client());
    let definition = ListenerDefinition::new("multi", ["a", "b"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .enabled(false)
        .method("onA", |_| Deferred::done())
        .method("onB", |_| Deferred::done());
    let listener = Listener::new(&store, &definition).unwrap();

    listener.listen().unwrap();

    assert!(!listener.is_bound());
    assert_eq!(emitter.listener_count("a"), 0);
    assert_eq!(emitter.listener_count("b"), 0);
}

#[test]
fn test_store_default_disables_listener_unless_it_opts_in() {
    let emitter = Arc::new(Emitter::new());
    let store = ComponentStore::new(
        client(),
        "listeners",
        Arc::new(RegistryResolver::<Listener>::new()),
        StoreOptions::default()
            .with_class_to_handle(Capability::LISTENER)
            .with_defaults(ComponentDefaults::default().enabled(false)),
    );
    let dormant = ListenerDefinition::new("dormant", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()));
    let eager = ListenerDefinition::new("eager", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .enabled(true);

    let dormant = Listener::new(&store, &dormant).unwrap();
    let eager = Listener::new(&store, &eager).unwrap();
    dormant.listen().unwrap();
    eager.listen().unwrap();

    assert!(!dormant.is_bound());
    assert!(eager.is_bound());
    assert_eq!(emitter.listener_count("ready"), 1);
}

#[test]
fn test_once_listener_fires_once() {
    let emitter = Arc::new(Emitter::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let store = listener_store(client());
    let definition = ListenerDefinition::new("boot", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .once(true)
        .run(counting(&runs));
    let listener = Listener::new(&store, &definition).unwrap();

    listener.listen().unwrap();
    emitter.emit("ready", &[]);
    emitter.emit("ready", &[]);

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(listener.unlisten(), 0);
}

#[test]
fn test_client_is_default_emitter() {
    let client = client();
    let runs = Arc::new(AtomicUsize::new(0));
    let store = listener_store(client.clone());
    let definition = ListenerDefinition::new("ready", ["ready"]).run(counting(&runs));
    let listener = Listener::new(&store, &definition).unwrap();

    listener.listen().unwrap();
    client.emit("ready", &[json!("shard-0")]);

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sync_failure_reaches_owner_and_spares_siblings() {
    let emitter = Arc::new(Emitter::new());
    let store = listener_store(client());
    let definition = ListenerDefinition::new("faulty", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(|_| Deferred::err(anyhow::anyhow!("handler broke")));
    let listener = Listener::new(&store, &definition).unwrap();

    let mut owner = MockOwner::new();
    owner
        .expect_notify()
        .withf(|notification| {
            matches!(
                notification,
                HandlerEvent::ListenerError { error, event, .. }
                    if event == "ready" && matches!(**error, ListenerFailure::Handler(_))
            )
        })
        .times(1)
        .return_const(());
    let owner = Arc::new(owner);
    listener.set_handler(&owner);
    listener.listen().unwrap();

    let sibling_runs = Arc::new(AtomicUsize::new(0));
    let sibling_counter = sibling_runs.clone();
    emitter.on(
        "ready",
        Arc::new(move |_| {
            sibling_counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert!(emitter.emit("ready", &[]));
    assert_eq!(sibling_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_handler_is_contained() {
    let emitter = Arc::new(Emitter::new());
    let store = listener_store(client());
    let definition = ListenerDefinition::new("faulty", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(|_| panic!("handler exploded"));
    let listener = Listener::new(&store, &definition).unwrap();

    let mut owner = MockOwner::new();
    owner
        .expect_notify()
        .withf(|notification| {
            matches!(
                notification,
                HandlerEvent::ListenerError { error, .. }
                    if matches!(
                        **error,
                        ListenerFailure::Panicked(ref msg) if msg == "handler exploded"
                    )
            )
        })
        .times(1)
        .return_const(());
    let owner = Arc::new(owner);
    listener.set_handler(&owner);
    listener.listen().unwrap();

    emitter.emit("ready", &[]);
}

#[tokio::test]
async fn test_success_reports_result() {
    let (_client, handler) = handler();
    let emitter = Arc::new(Emitter::new());
    let definition = ListenerDefinition::new("echo", ["message"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(|args| Deferred::ok(args.first().cloned().unwrap_or(Value::Null)));
    let listener = Listener::new(handler.store(), &definition).unwrap();
    handler.attach(&listener).unwrap();

    let mut events = handler.subscribe();
    emitter.emit("message", &[json!("hello")]);

    match next_event(&mut events).await {
        HandlerEvent::ListenerRan {
            listener: ran,
            event,
            result,
        } => {
            assert!(Arc::ptr_eq(&ran, &listener));
            assert_eq!(event, "message");
            assert_eq!(result, json!("hello"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_async_failure_is_reported() {
    let (_client, handler) = handler();
    let emitter = Arc::new(Emitter::new());
    let definition = ListenerDefinition::new("slow", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(|_| {
            Deferred::future(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(anyhow::anyhow!("async failure"))
            })
        });
    let listener = Listener::new(handler.store(), &definition).unwrap();
    handler.attach(&listener).unwrap();

    let mut events = handler.subscribe();
    assert!(emitter.emit("ready", &[]));

    match next_event(&mut events).await {
        HandlerEvent::ListenerError { error, .. } => {
            assert_eq!(error.to_string(), "Handler failed: async failure");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_async_handler_without_runtime_runs_to_completion() {
    let client = client();
    let store = listener_store(client.clone());
    let definition = ListenerDefinition::new("sleepy", ["ready"]).run(|_| {
        Deferred::future(async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(json!("slept"))
        })
    });
    let listener = Listener::new(&store, &definition).unwrap();

    let mut owner = MockOwner::new();
    owner
        .expect_notify()
        .withf(|notification| {
            matches!(
                notification,
                HandlerEvent::ListenerRan { event, result, .. }
                    if event == "ready" && *result == json!("slept")
            )
        })
        .times(1)
        .return_const(());
    let owner = Arc::new(owner);
    listener.set_handler(&owner);
    listener.listen().unwrap();

    assert!(client.emit("ready", &[]));
}

#[test]
fn test_unknown_named_emitter_is_fatal() {
    let (_client, handler) = handler();
    let definition = ListenerDefinition::new("gateway", ["ready"])
        .emitter(EmitterRef::Named("gateway".to_string()));
    let listener = Listener::new(handler.store(), &definition).unwrap();

    let err = handler.attach(&listener).unwrap_err();

    assert!(matches!(err, ComponentError::UnknownEmitter(ref key) if key == "gateway"));
    assert!(!listener.is_bound());
}

#[test]
fn test_attach_all_binds_healthy_listeners_past_a_broken_one() {
    let (client, handler) = handler();
    let broken = ListenerDefinition::new("broken", ["ready"])
        .emitter(EmitterRef::Named("nope".to_string()));
    Listener::new(handler.store(), &broken).unwrap();
    for index in 0..6 {
        let definition = ListenerDefinition::new(format!("healthy-{}", index), ["ready"]);
        Listener::new(handler.store(), &definition).unwrap();
    }
    let mut failures = handler.failures();

    let summary = handler.attach_all();

    assert_eq!(summary.attached, 6);
    assert_eq!(client.listener_count("ready"), 6);
    assert!(!summary.is_clean());
    let (name, error) = &summary.failed[0];
    assert_eq!(name, "broken");
    assert!(matches!(**error, ComponentError::UnknownEmitter(ref key) if key == "nope"));
    match failures.try_recv() {
        Some(Ok(HandlerEvent::BindFailed { listener, .. })) => {
            assert_eq!(listener.name(), "broken");
            assert!(!listener.is_bound());
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_failures_stream_skips_successful_runs() {
    let (_client, handler) = handler();
    let emitter = Arc::new(Emitter::new());
    let fine = ListenerDefinition::new("fine", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(|_| Deferred::ok(json!("ok")));
    let faulty = ListenerDefinition::new("faulty", ["ready"])
        .emitter(EmitterRef::Source(emitter.clone()))
        .run(|_| Deferred::err(anyhow::anyhow!("handler broke")));
    for definition in [fine, faulty] {
        let listener = Listener::new(handler.store(), &definition).unwrap();
        handler.attach(&listener).unwrap();
    }
    let mut everything = handler.subscribe();
    let mut failures = handler.failures();

    emitter.emit("ready", &[]);

    assert_eq!(std::iter::from_fn(|| everything.try_recv().ok()).count(), 2);
    let reported = failures.drain();
    assert_eq!(reported.len(), 1);
    assert!(matches!(
        &reported[0],
        HandlerEvent::ListenerError { listener, .. } if listener.name() == "faulty"
    ));
}

#[test]
fn test_named_emitter_without_handler_is_fatal() {
    let store = listener_store(client());
    let definition = ListenerDefinition::new("gateway", ["ready"])
        .emitter(EmitterRef::Named("gateway".to_string()));
    let listener = Listener::new(&store, &definition).unwrap();

    let err = listener.listen().unwrap_err();
    assert!(matches!(err, ComponentError::HandlerNotAssigned(_)));
}

#[test]
fn test_named_emitter_resolves_through_handler() {
    let (_client, handler) = handler();
    let gateway = Arc::new(Emitter::new());
    handler.register_emitter("gateway", gateway.clone());

    let runs = Arc::new(AtomicUsize::new(0));
    let definition = ListenerDefinition::new("gateway", ["ready"])
        .emitter(EmitterRef::Named("gateway".to_string()))
        .run(counting(&runs));
    let listener = Listener::new(handler.store(), &definition).unwrap();
    handler.attach(&listener).unwrap();

    gateway.emit("ready", &[]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(handler.emitter_keys(), vec!["gateway".to_string()]);
}

#[test]
fn test_handler_remove_unbinds() {
    let (client, handler) = handler();
    let definition = ListenerDefinition::new("ready", ["ready"]);
    let listener = Listener::new(handler.store(), &definition).unwrap();
    handler.attach(&listener).unwrap();
    assert_eq!(client.listener_count("ready"), 1);

    let removed = handler.remove("ready").unwrap();

    assert!(Arc::ptr_eq(&removed, &listener));
    assert_eq!(client.listener_count("ready"), 0);
    assert!(handler.store().get("ready").is_none());
}

#[test]
fn test_detach_all_keeps_listeners_registered() {
    let (client, handler) = handler();
    for name in ["first", "second"] {
        Listener::new(handler.store(), &ListenerDefinition::new(name, ["ready"])).unwrap();
    }
    let summary = handler.attach_all();
    assert_eq!(summary.attached, 2);
    assert!(summary.is_clean());
    assert_eq!(client.listener_count("ready"), 2);

    assert_eq!(handler.detach_all(), 2);
    assert_eq!(client.listener_count("ready"), 0);
    assert_eq!(handler.store().len(), 2);
}

#[tokio::test]
async fn test_handler_load_binds_new_listener() {
    let client = client();
    let runs = Arc::new(AtomicUsize::new(0));
    let resolver = RegistryResolver::<Listener>::new()
        .with("ready", ListenerDefinition::new("ready", ["ready"]).run(counting(&runs)));
    let handler = ListenerHandler::new(client.clone(), Arc::new(resolver));

    let outcome = handler.load(Path::new("components/listeners/ready.toml")).await;

    assert_eq!(outcome, LoadOutcome::Loaded);
    client.emit("ready", &[]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_listener_store_rejects_non_listener_definitions() {
    struct Impostor;

    impl core_components::ComponentDefinition<Listener> for Impostor {
        fn name(&self) -> &str {
            "impostor"
        }

        fn lineage(&self) -> &[Capability] {
            &[Capability::COMPONENT, Capability::MODULE]
        }

        fn construct(&self, _store: &Arc<ComponentStore<Listener>>) -> core_components::Result<()> {
            panic!("must not be constructed");
        }
    }

    let (_client, handler) = {
        let client = client();
        let resolver = RegistryResolver::<Listener>::new().with("impostor", Impostor);
        let handler = ListenerHandler::new(client.clone(), Arc::new(resolver));
        (client, handler)
    };
    let mut store_events = handler.store().subscribe();

    let outcome = handler.load(Path::new("listeners/impostor.toml")).await;

    assert_eq!(outcome, LoadOutcome::Failed);
    match store_events.try_recv().unwrap() {
        StoreEvent::Error { error, .. } => {
            assert!(matches!(error.cause(), Some(ComponentError::IllegalState(_))));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_load_all_from_directory_binds_listeners() {
    let dir = tempfile::tempdir().unwrap();
    let listeners = dir.path().join("listeners");
    std::fs::create_dir_all(listeners.join("moderation")).unwrap();
    std::fs::write(listeners.join("ready.toml"), "").unwrap();
    std::fs::write(listeners.join("moderation").join("presence.toml"), "").unwrap();
    std::fs::write(listeners.join("notes.toml"), "").unwrap();
    std::fs::write(listeners.join("README.md"), "").unwrap();

    let config = RuntimeConfig::builder()
        .base_directory(dir.path())
        .discovery(Arc::new(
            FsSourceDiscovery::new(dir.path()).with_extensions(["toml"]),
        ))
        .build()
        .unwrap();
    let client = Client::new(config);

    let ready_runs = Arc::new(AtomicUsize::new(0));
    let presence_calls = Arc::new(Mutex::new(Vec::new()));
    let resolver = RegistryResolver::<Listener>::new()
        .with(
            "ready",
            ListenerDefinition::new("ready", ["ready"]).run(counting(&ready_runs)),
        )
        .with(
            "presence",
            ListenerDefinition::new("presence", ["online", "offline"])
                .method("onOnline", recording(&presence_calls, "onOnline"))
                .method("onOffline", recording(&presence_calls, "onOffline")),
        );
    let handler = ListenerHandler::with_options(
        client.clone(),
        Arc::new(resolver),
        StoreOptions::default()
            .with_class_to_handle(Capability::LISTENER)
            .with_auto_category(true),
    );

    let summaries = client.load_all().await.unwrap();

    assert_eq!(summaries.len(), 1);
    let (store, summary) = &summaries[0];
    assert_eq!(store, "listeners");
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        handler.store().category_of(&listeners.join("moderation").join("presence.toml")),
        Some("moderation".to_string())
    );

    client.emit("ready", &[]);
    client.emit("offline", &[]);
    client.emit("online", &[]);

    assert_eq!(ready_runs.load(Ordering::SeqCst), 1);
    assert_eq!(*presence_calls.lock().unwrap(), vec!["onOffline", "onOnline"]);
    assert!(handler.store().get("presence").unwrap().is_bound());
}
