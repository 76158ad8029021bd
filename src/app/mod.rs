use crate::api::ApiClient;
use crate::channel::{self, ChannelOptions, ConnectionState};
use crate::config::Config;
use crate::hub::RealtimeHub;
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Duration;

const PING_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let command = args.next();

    if command.as_deref() == Some("config-init") {
        return handle_config_init();
    }

    let config = Config::load()?;
    match command.as_deref() {
        None | Some("listen") => handle_listen(&config).await,
        Some("ping") => handle_ping(&config).await,
        Some("api-get") => {
            let path = args.next().ok_or("missing path (usage: api-get <path>)")?;
            handle_api_get(&config, &path).await
        }
        Some(other) => Err(format!(
            "unknown command `{other}` (expected listen, ping, api-get <path>, config-init)"
        )
        .into()),
    }
}

async fn handle_listen(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let hub = RealtimeHub::from_config(config);
    let mut status = hub.channel().watch_status();
    let mut signals = hub.signals().subscribe();
    let mut notices = hub.notifications().watch();
    let mut analytics = hub.analytics().watch();
    let mut seen: HashSet<String> = HashSet::new();

    hub.connect();
    tracing::info!(endpoint = %config.channel.url, "listening for storefront events; ctrl-c to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                tracing::info!(
                    state = %snapshot.state,
                    attempts = snapshot.reconnect_attempts,
                    exhausted = snapshot.reconnect_exhausted,
                    last_error = ?snapshot.last_error,
                    "channel status"
                );
            }
            signal = signals.recv() => match signal {
                Ok(signal) => {
                    let data = serde_json::Value::Object(signal.data().clone());
                    tracing::info!(signal = signal.name(), data = %data, "store signal");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "signal listener lagged");
                }
                Err(RecvError::Closed) => break,
            },
            changed = notices.changed() => {
                if changed.is_err() {
                    break;
                }
                let list = notices.borrow_and_update().clone();
                for notice in list.iter().filter(|n| !seen.contains(&n.id)) {
                    tracing::info!(
                        id = %notice.id,
                        kind = %notice.kind,
                        priority = ?notice.priority,
                        title = %notice.title,
                        message = %notice.message,
                        "notification"
                    );
                }
                seen = list.iter().map(|n| n.id.clone()).collect();
                tracing::debug!(
                    total = list.len(),
                    unread = list.iter().filter(|n| !n.read).count(),
                    "notification center updated"
                );
            }
            changed = analytics.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = analytics.borrow_and_update().clone();
                tracing::info!(
                    analytics = ?snapshot.analytics,
                    realtime_stats = ?snapshot.realtime_stats,
                    "analytics updated"
                );
            }
            _ = &mut ctrl_c => {
                tracing::info!("shutdown: ctrl-c");
                break;
            }
        }
    }

    hub.disconnect();
    hub.channel()
        .wait_for_state(ConnectionState::Disconnected, SHUTDOWN_TIMEOUT)
        .await;
    Ok(())
}

async fn handle_ping(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let handle = channel::spawn(ChannelOptions::from_config(&config.channel));
    handle.connect();

    if !handle
        .wait_for_state(ConnectionState::Connected, PING_CONNECT_TIMEOUT)
        .await
    {
        let status = handle.status();
        handle.disconnect();
        return Err(format!(
            "could not connect to {} within {}s (last error: {})",
            config.channel.url,
            PING_CONNECT_TIMEOUT.as_secs(),
            status.last_error.as_deref().unwrap_or("none")
        )
        .into());
    }

    let outcome = handle.send_ping()?;
    println!("ping to {}: {:?}", config.channel.url, outcome);

    handle.disconnect();
    handle
        .wait_for_state(ConnectionState::Disconnected, SHUTDOWN_TIMEOUT)
        .await;
    Ok(())
}

async fn handle_api_get(config: &Config, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = ApiClient::builder(config.api.base_url.as_str())
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .build()?;
    let value: serde_json::Value = client.get(path).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn handle_config_init() -> Result<(), Box<dyn std::error::Error>> {
    let path = Config::default_path();
    Config::write_default(&path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
