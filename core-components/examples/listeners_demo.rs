//! Loads listeners from a directory and fires a few events at them.
//!
//! Run with: `cargo run -p core-components --example listeners_demo`

use bridge_desktop::FsSourceDiscovery;
use core_components::{
    Capability, Client, Component, Deferred, HandlerEvent, ListenerDefinition, ListenerHandler,
    RegistryResolver, StoreOptions,
};
use core_runtime::config::RuntimeConfig;
use core_runtime::events::EventSource;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Pretty)
            .with_filter("core_components=debug"),
    )?;

    let dir = tempfile::tempdir()?;
    let listeners = dir.path().join("listeners");
    std::fs::create_dir_all(listeners.join("presence"))?;
    std::fs::write(listeners.join("ready.toml"), "")?;
    std::fs::write(listeners.join("presence").join("status.toml"), "")?;

    let config = RuntimeConfig::builder()
        .base_directory(dir.path())
        .discovery(Arc::new(
            FsSourceDiscovery::new(dir.path()).with_extensions(["toml"]),
        ))
        .build()?;
    let client = Client::new(config);

    let resolver = RegistryResolver::<core_components::Listener>::new()
        .with(
            "ready",
            ListenerDefinition::new("ready", ["ready"])
                .once(true)
                .run(|args| Deferred::ok(json!({ "shard": args.first() }))),
        )
        .with(
            "status",
            ListenerDefinition::new("status", ["online", "offline"])
                .map("offline", "onGone")
                .method("onOnline", |args| Deferred::ok(json!(args)))
                .method("onGone", |_| {
                    Deferred::future(async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err(anyhow::anyhow!("presence backend unavailable"))
                    })
                }),
        );

    let handler = ListenerHandler::with_options(
        client.clone(),
        Arc::new(resolver),
        StoreOptions::default()
            .with_class_to_handle(Capability::LISTENER)
            .with_auto_category(true),
    );
    let mut events = handler.subscribe();
    let mut failures = handler.failures();

    for (store, summary) in client.load_all().await? {
        println!("{}: {}", store, serde_json::to_string(&summary)?);
    }

    client.emit("ready", &[json!(0)]);
    client.emit("ready", &[json!(1)]);
    client.emit("online", &[json!("alice")]);
    client.emit("offline", &[json!("alice")]);

    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await?? {
            HandlerEvent::ListenerRan {
                listener,
                event,
                result,
            } => println!("{} handled '{}': {}", listener.name(), event, result),
            HandlerEvent::ListenerError {
                listener,
                event,
                error,
            } => println!("{} failed on '{}': {}", listener.name(), event, error),
            HandlerEvent::BindFailed { listener, error } => {
                println!("{} was not bound: {}", listener.name(), error)
            }
        }
    }

    println!("{} failure(s) reported", failures.drain().len());

    handler.detach_all();
    Ok(())
}
