//! Long-running entry points: the full bot and the standalone login server.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::inbound::http::{serve, spawn_cleanup, ServerState};
use crate::application::auth::AuthService;
use crate::application::data::DataCollector;
use crate::application::trading::{CycleOutcome, TradingEngine, CYCLE_INTERVAL};
use crate::error::{ConfigError, Error, Result};
use crate::infrastructure::bootstrap::{build_components, Components};
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::runtime::RuntimeState;
use crate::port::outbound::notifier::{Event, NotifierRegistry};

/// Resolves once `shutdown` flips to true or its sender is dropped.
fn shutdown_signal(mut shutdown: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Bind the postback server and start the expiry sweeper.
async fn start_server(
    config: &Config,
    auth: Arc<AuthService>,
    components: &Components,
    shutdown: watch::Receiver<bool>,
) -> Result<(JoinHandle<Result<()>>, JoinHandle<()>)> {
    let address = config.auth.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| Error::Connection(format!("failed to bind {address}: {e}")))?;

    let runtime: Arc<dyn RuntimeState> = components.runtime.clone();
    let state = Arc::new(ServerState::new(
        Arc::clone(&auth),
        runtime,
        Some(Arc::clone(&components.store)),
    ));
    let server = tokio::spawn(serve(listener, state, shutdown_signal(shutdown)));
    let cleanup = spawn_cleanup(auth, config.auth.cleanup_interval());
    info!(postback_url = %config.auth.postback_url(), "Login server started");
    Ok((server, cleanup))
}

#[cfg(feature = "telegram")]
fn start_telegram_commands(config: &Config, components: &Components) -> Option<JoinHandle<()>> {
    use crate::adapter::outbound::notifier::telegram::spawn_command_listener;

    if !config.telegram.enabled {
        return None;
    }
    let tg_config = config.telegram.notifier_config(&config.secrets)?;
    let runtime: Arc<dyn RuntimeState> = components.runtime.clone();
    Some(spawn_command_listener(tg_config, runtime))
}

#[cfg(not(feature = "telegram"))]
fn start_telegram_commands(_config: &Config, _components: &Components) -> Option<JoinHandle<()>> {
    None
}

/// Archive the day's candles once the collection window opens.
async fn collect_market_data(collector: &DataCollector, notifier: &NotifierRegistry, now: DateTime<Utc>) {
    match collector.run_scheduled(now).await {
        Ok(Some(report)) => info!(
            date = %report.metadata.date,
            files = report.metadata.files,
            missing = report.missing.len(),
            "Market data archived"
        ),
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Market data collection failed");
            notifier.notify_all(Event::SystemError {
                context: "data collection".to_string(),
                message: e.to_string(),
            });
        }
    }
}

async fn stop_server(server: Option<(JoinHandle<Result<()>>, JoinHandle<()>)>) -> Result<()> {
    let Some((server, cleanup)) = server else {
        return Ok(());
    };
    let result = match server.await {
        Ok(result) => result,
        Err(e) => Err(Error::Connection(format!("server task failed: {e}"))),
    };
    cleanup.abort();
    result
}

/// Run the trading loop, login server and Telegram control until `shutdown`.
///
/// One engine cycle runs every [`CYCLE_INTERVAL`]. Cycle errors are logged
/// and reported by the engine; they never stop the loop. After the close
/// the day's candles are archived when `[data]` is enabled.
///
/// # Errors
///
/// Fails when wiring fails or the postback port cannot be bound.
pub async fn run_with_shutdown(config: Config, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    info!(mode = %config.mode, "Starting sensexbot");

    if let Some(issue) = config.credential_issues().into_iter().next() {
        return Err(ConfigError::from(issue).into());
    }

    let components = build_components(&config)?;

    let server = match &components.auth {
        Some(auth) => Some(start_server(&config, Arc::clone(auth), &components, shutdown.clone()).await?),
        None => {
            warn!("ZAPI_KEY not set, login server disabled");
            None
        }
    };
    let commands = start_telegram_commands(&config, &components);
    if commands.is_some() {
        info!("Telegram command listener started");
    }

    let mut engine = TradingEngine::new(
        Arc::clone(&components.broker),
        Arc::clone(&components.risk),
        Arc::clone(&components.store),
        Arc::clone(&components.notifier),
        config.strategy.engine_settings()?,
    );

    let mut ticker = tokio::time::interval(CYCLE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(interval_secs = CYCLE_INTERVAL.as_secs(), "Trading loop started");

    loop {
        tokio::select! {
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    info!("Shutdown signal received");
                    break;
                }
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                match engine.run_cycle(now).await {
                    Ok(CycleOutcome::Skipped) => debug!("Cycle skipped"),
                    Ok(outcome) => debug!(?outcome, "Cycle complete"),
                    Err(e) => error!(error = %e, "Cycle failed"),
                }
                if let Some(collector) = &components.collector {
                    collect_market_data(collector, &components.notifier, now).await;
                }
            }
        }
    }

    if let Some(commands) = commands {
        commands.abort();
    }
    stop_server(server).await?;
    info!("sensexbot stopped");
    Ok(())
}

/// Serve only the login endpoints until `shutdown`.
///
/// # Errors
///
/// Fails without `ZAPI_KEY`, or when the port cannot be bound.
pub async fn serve_auth_with_shutdown(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let components = build_components(&config)?;
    let Some(auth) = components.auth.clone() else {
        return Err(ConfigError::MissingField { field: "ZAPI_KEY" }.into());
    };
    let server = start_server(&config, auth, &components, shutdown).await?;
    stop_server(Some(server)).await
}
