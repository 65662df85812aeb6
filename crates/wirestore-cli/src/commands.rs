//! Command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tokio::time::timeout;

use wirestore_core::{
    ActionCall, Config, Envelope, NotifySink, Session, SessionStatus, SyncedStore,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn stderr_sink() -> NotifySink {
    Arc::new(|msg: &str| eprintln!("{msg}"))
}

fn open_session(config: &Config) -> Session {
    Session::from_config(config).with_notify(stderr_sink())
}

async fn wait_connected(session: &Session, wait: Duration) -> Result<()> {
    let mut rx = session.subscribe_status();
    timeout(wait, async {
        loop {
            if *rx.borrow() == SessionStatus::Connected {
                return Ok(());
            }
            rx.changed()
                .await
                .context("session closed while connecting")?;
        }
    })
    .await
    .map_err(|_| anyhow!("timed out connecting to {}", session.url()))?
}

/// Watch a store, printing every update until Ctrl-C
pub async fn watch(config: &Config, key: &str) -> Result<()> {
    let session = open_session(config);
    session.connect();

    let store = SyncedStore::new(Value::Null, key, &session)?;
    wait_connected(&session, CONNECT_TIMEOUT).await?;
    store.fetch()?;

    let mut updates = store.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                println!("{}", serde_json::to_string_pretty(&state)?);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown();
    Ok(())
}

/// Fetch the current full state of a store once and print it
pub async fn fetch(config: &Config, key: &str) -> Result<()> {
    let session = open_session(config);
    session.connect();

    let store = SyncedStore::new(Value::Null, key, &session)?;
    wait_connected(&session, CONNECT_TIMEOUT).await?;
    store.fetch()?;

    let mut updates = store.subscribe();
    timeout(FETCH_TIMEOUT, updates.changed())
        .await
        .map_err(|_| anyhow!("timed out waiting for state of '{key}'"))?
        .ok();

    println!("{}", serde_json::to_string_pretty(&store.get())?);
    session.shutdown();
    Ok(())
}

/// Push a state value to a store
pub async fn push(config: &Config, key: &str, state_json: &str) -> Result<()> {
    let value: Value = serde_json::from_str(state_json).context("state must be valid JSON")?;

    let session = open_session(config);
    session.connect();
    wait_connected(&session, CONNECT_TIMEOUT).await?;

    session.send(key, value)?;
    // Shutdown is queued behind the send, so the frame is flushed first.
    session.shutdown();
    println!("Pushed state to '{key}'");
    Ok(())
}

/// Invoke a remote action by name.
///
/// The library surface is typed delegate sets; the CLI is the one caller
/// that sends open-ended action calls.
pub async fn action(config: &Config, key: &str, name: &str, params: Option<&str>) -> Result<()> {
    let parameters: Value = match params {
        Some(p) => serde_json::from_str(p).context("parameters must be valid JSON")?,
        None => Value::Object(Default::default()),
    };

    let session = open_session(config);
    session.connect();
    wait_connected(&session, CONNECT_TIMEOUT).await?;

    session.send_envelope(Envelope::action(
        key,
        ActionCall {
            action_name: name.to_string(),
            parameters,
        },
    ))?;
    session.shutdown();
    println!("Invoked '{name}' on '{key}'");
    Ok(())
}

/// Show endpoint configuration and probe connectivity
pub async fn status(config: &Config) -> Result<()> {
    println!("endpoint:    {}", config.endpoint);
    println!("client name: {}", config.client_name);
    println!("data dir:    {}", config.data_dir.display());

    let session = open_session(config);
    session.connect();
    match wait_connected(&session, Duration::from_secs(5)).await {
        Ok(()) => println!("connection:  ok"),
        Err(e) => println!("connection:  failed ({e})"),
    }
    session.shutdown();
    Ok(())
}

/// Print the active configuration
pub fn config_show(config: &Config) -> Result<()> {
    println!("endpoint = \"{}\"", config.endpoint);
    println!("client_name = \"{}\"", config.client_name);
    println!("data_dir = \"{}\"", config.data_dir.display());
    println!(
        "initial_reconnect_delay_ms = {}",
        config.initial_reconnect_delay_ms
    );
    println!("max_reconnect_delay_ms = {}", config.max_reconnect_delay_ms);
    Ok(())
}

/// Set a configuration field and save the file
pub fn config_set(field: &str, value: &str) -> Result<()> {
    // Reload so a --endpoint flag doesn't get persisted as a side effect.
    let mut config = Config::load()?;
    match field {
        "endpoint" => config.endpoint = value.to_string(),
        "client_name" => config.client_name = value.to_string(),
        "data_dir" => config.data_dir = PathBuf::from(value),
        other => bail!("unknown config field '{other}' (expected endpoint, client_name, or data_dir)"),
    }
    config.save()?;
    println!("Set {field}");
    Ok(())
}
