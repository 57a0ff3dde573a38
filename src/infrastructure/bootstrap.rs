//! Infrastructure bootstrap helpers for runtime wiring.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

#[cfg(feature = "telegram")]
use crate::adapter::outbound::notifier::telegram::TelegramNotifier;
use crate::adapter::outbound::archive::CsvCandleArchive;
use crate::adapter::outbound::credential::EnvFileCredentialStore;
use crate::adapter::outbound::kite::{KiteClient, PaperBroker};
use crate::adapter::outbound::sqlite::SqliteStore;
use crate::application::auth::{AuthService, AuthSettings};
use crate::application::data::{CollectorSettings, DataCollector};
use crate::application::risk::{BalanceSource, RiskManager};
use crate::application::runtime::BotRuntime;
use crate::application::state::AppState;
use crate::domain::{mask_secret, TradingMode};
use crate::error::{ConfigError, Result};
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::archive::CandleArchive;
use crate::port::outbound::broker::Broker;
use crate::port::outbound::credential::CredentialStore;
use crate::port::outbound::notifier::{LogNotifier, NotifierRegistry};
use crate::port::outbound::store::TradeStore;

/// Everything a running bot is made of.
pub struct Components {
    pub store: Arc<dyn TradeStore>,
    pub credentials: Arc<dyn CredentialStore>,
    /// Present whenever `ZAPI_KEY` is set.
    pub kite: Option<Arc<KiteClient>>,
    /// Order routing for the configured mode.
    pub broker: Arc<dyn Broker>,
    pub notifier: Arc<NotifierRegistry>,
    pub state: Arc<AppState>,
    pub risk: Arc<RiskManager>,
    /// Present whenever `kite` is.
    pub auth: Option<Arc<AuthService>>,
    pub runtime: Arc<BotRuntime>,
    /// Present when `[data] enabled`.
    pub collector: Option<Arc<DataCollector>>,
}

/// Build notifier registry from configuration.
pub(crate) fn build_notifier_registry(config: &Config) -> NotifierRegistry {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier));

    #[cfg(feature = "telegram")]
    if config.telegram.enabled {
        match config.telegram.notifier_config(&config.secrets) {
            Some(tg_config) => {
                registry.register(Box::new(TelegramNotifier::new(tg_config)));
                info!("Telegram notifier enabled");
            }
            None => warn!("Telegram enabled but TELEGRAM_TOKEN or TELEGRAM_CHAT_ID not set"),
        }
    }
    #[cfg(not(feature = "telegram"))]
    let _ = config;

    registry
}

/// Open the SQLite store, creating the schema on first use.
pub(crate) fn open_store(config: &Config) -> Result<Arc<dyn TradeStore>> {
    let store = SqliteStore::open(&config.database)?;
    info!(database = %config.database, "Database initialized");
    Ok(Arc::new(store))
}

pub(crate) fn build_archive(config: &Config) -> Arc<dyn CandleArchive> {
    Arc::new(CsvCandleArchive::new(&config.data.dir))
}

/// End-of-day collector over `broker`, writing to the configured data dir.
pub(crate) fn build_collector(
    config: &Config,
    broker: Arc<dyn Broker>,
    notifier: Arc<NotifierRegistry>,
) -> Result<DataCollector> {
    let settings = CollectorSettings {
        interval: config.strategy.interval()?,
        expiry_weekday: config.strategy.expiry_weekday()?,
        retention_days: config.data.retention_days,
    };
    Ok(DataCollector::new(
        broker,
        build_archive(config),
        notifier,
        config.market.calendar()?,
        settings,
    ))
}

pub(crate) fn build_credentials(config: &Config) -> Arc<dyn CredentialStore> {
    Arc::new(EnvFileCredentialStore::new(
        &config.env_file,
        &config.auth_data_dir,
    ))
}

/// Kite client primed with the stored (or environment) access token.
pub(crate) fn build_kite(
    config: &Config,
    credentials: &dyn CredentialStore,
) -> Result<Option<Arc<KiteClient>>> {
    let Some(kite_config) = config.kite.client_config(&config.secrets) else {
        return Ok(None);
    };
    let stored = match credentials.load() {
        Ok(token) => token.map(|t| t.access_token),
        Err(e) => {
            warn!(error = %e, "Stored access token unreadable");
            None
        }
    };
    let token = stored.or_else(|| config.secrets.access_token.clone());
    if let Some(token) = &token {
        info!(token = %mask_secret(token), "Access token loaded");
    }
    let client = KiteClient::new(kite_config)?.with_access_token(token);
    Ok(Some(Arc::new(client)))
}

/// Order routing per mode: synthetic, Kite data with simulated fills, or Kite.
pub(crate) fn build_broker(
    config: &Config,
    kite: Option<&Arc<KiteClient>>,
) -> Result<Arc<dyn Broker>> {
    let virtual_balance = config.risk.virtual_balance;
    let broker: Arc<dyn Broker> = match (config.mode, kite) {
        (TradingMode::Test, _) => Arc::new(PaperBroker::synthetic(virtual_balance)),
        (TradingMode::Paper, Some(kite)) => {
            let data: Arc<dyn Broker> = kite.clone();
            Arc::new(PaperBroker::new(Some(data), virtual_balance))
        }
        (TradingMode::Paper, None) => {
            warn!("ZAPI_KEY not set, paper mode falls back to synthetic data");
            Arc::new(PaperBroker::synthetic(virtual_balance))
        }
        (TradingMode::Live, Some(kite)) => kite.clone(),
        (TradingMode::Live, None) => {
            return Err(ConfigError::MissingField { field: "ZAPI_KEY" }.into());
        }
    };
    Ok(broker)
}

pub(crate) fn build_auth(
    config: &Config,
    kite: &Arc<KiteClient>,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<NotifierRegistry>,
) -> AuthService {
    let mut settings = AuthSettings::new(
        kite.api_key(),
        config.mode,
        config.auth.postback_url(),
    );
    settings.timeout = Duration::seconds(i64::try_from(config.auth.timeout_secs).unwrap_or(300));

    let listener_client = Arc::clone(kite);
    AuthService::new(settings, kite.clone(), credentials, notifier).with_token_listener(Box::new(
        move |token: &str| listener_client.set_access_token(token),
    ))
}

/// Wire the stores, broker, risk manager and login service for `config`.
///
/// Counters are restored from the database before returning.
///
/// # Errors
///
/// Fails when the database cannot be opened, the HTTP client cannot be
/// built, or live mode has no api key.
pub fn build_components(config: &Config) -> Result<Components> {
    let store = open_store(config)?;
    let credentials = build_credentials(config);
    let kite = build_kite(config, credentials.as_ref())?;
    let broker = build_broker(config, kite.as_ref())?;

    let notifier = Arc::new(build_notifier_registry(config));
    info!(notifiers = notifier.len(), "Notifiers initialized");

    let state = Arc::new(AppState::new(config.mode, config.risk_limits()));
    let live_broker = if config.mode.is_live() {
        Some(Arc::clone(&broker))
    } else {
        None
    };
    let balance = Arc::new(BalanceSource::new(
        config.mode,
        live_broker,
        config.risk.virtual_balance,
        config.risk.emergency_balance,
    ));
    let calendar = config.market.calendar()?;
    let risk = Arc::new(RiskManager::new(
        Arc::clone(&state),
        Arc::clone(&store),
        Arc::clone(&notifier),
        calendar,
        balance,
    ));
    risk.restore(Utc::now())?;

    let auth = kite.as_ref().map(|kite| {
        Arc::new(build_auth(
            config,
            kite,
            Arc::clone(&credentials),
            Arc::clone(&notifier),
        ))
    });

    let collector = if config.data.enabled {
        let collector = build_collector(config, Arc::clone(&broker), Arc::clone(&notifier))?;
        info!(dir = %config.data.dir, "Market data collection enabled");
        Some(Arc::new(collector))
    } else {
        None
    };

    let runtime = Arc::new(BotRuntime::new(
        Arc::clone(&risk),
        auth.clone(),
        Arc::clone(&credentials),
        config.secrets.api_key.is_some(),
    ));

    Ok(Components {
        store,
        credentials,
        kite,
        broker,
        notifier,
        state,
        risk,
        auth,
        runtime,
        collector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::trading::{CycleOutcome, TradingEngine};
    use crate::testkit::domain::{ist, trading_day};

    fn config(dir: &tempfile::TempDir, content: &str, env: &[(&str, &str)]) -> Config {
        let pairs: Vec<(String, String)> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut config =
            Config::parse_toml_with(content, |key| {
                pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
            })
            .unwrap();
        config.database = dir.path().join("bot.db").display().to_string();
        config.env_file = dir.path().join(".env").display().to_string();
        config.auth_data_dir = dir.path().join("auth_data").display().to_string();
        config.telegram.enabled = false;
        config.data.dir = dir.path().join("option_data").display().to_string();
        config
    }

    #[test]
    fn test_mode_needs_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let components = build_components(&config(&dir, "", &[])).unwrap();
        assert!(components.kite.is_none());
        assert!(components.auth.is_none());
        assert_eq!(components.notifier.len(), 1);
        assert!(components.store.ping().is_ok());
        assert!(components.collector.is_some());
    }

    #[test]
    fn disabled_data_section_skips_the_collector() {
        let dir = tempfile::tempdir().unwrap();
        let components = build_components(&config(&dir, "[data]\nenabled = false\n", &[])).unwrap();
        assert!(components.collector.is_none());
    }

    #[tokio::test]
    async fn collector_writes_under_the_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, "", &[]);
        let components = build_components(&config).unwrap();
        let collector = components.collector.expect("collector");
        let day = trading_day();

        let report = collector.run_scheduled(ist(day, 15, 26)).await.unwrap().expect("collected");

        assert_eq!(report.metadata.date, day);
        assert!(dir.path().join("option_data").join("raw_data").join("2025-01").join("2025-01-06").is_dir());
    }

    #[test]
    fn api_key_enables_login_service() {
        let dir = tempfile::tempdir().unwrap();
        let components = build_components(&config(
            &dir,
            "mode = \"paper\"",
            &[("ZAPI_KEY", "kitekey"), ("ZAPI_SECRET", "kitesecret")],
        ))
        .unwrap();
        let auth = components.auth.expect("auth service");
        assert_eq!(auth.settings().postback_url, "http://localhost:8080/postback");
        assert_eq!(auth.settings().timeout, Duration::seconds(300));
        assert!(components.kite.is_some());
    }

    #[test]
    fn live_without_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_components(&config(&dir, "mode = \"live\"", &[]))
            .err()
            .expect("live mode without key");
        assert!(err.to_string().contains("ZAPI_KEY"));
    }

    #[tokio::test]
    async fn test_mode_components_drive_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, "", &[]);
        let components = build_components(&config).unwrap();
        let mut engine = TradingEngine::new(
            components.broker,
            components.risk,
            components.store,
            components.notifier,
            config.strategy.engine_settings().unwrap(),
        );
        let outcome = engine.run_cycle(ist(trading_day(), 11, 0)).await.unwrap();
        assert_ne!(outcome, CycleOutcome::Skipped);
    }
}
