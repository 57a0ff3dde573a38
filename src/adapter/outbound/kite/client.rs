//! Kite Connect REST client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::dto::{
    Envelope, HistoricalData, InstrumentRecord, LtpData, Margins, OrderData, SessionData,
};
use crate::domain::calendar::{ist, ist_date};
use crate::domain::mask_secret;
use crate::domain::money::{price_from_f64, Price};
use crate::domain::Candle;
use crate::error::{BrokerError, ConfigError, Error, Result};
use crate::port::outbound::broker::{
    Broker, CandleInterval, Instrument, OrderAck, OrderRequest, OrderType, SessionExchanger,
    SessionGrant,
};

pub const KITE_API_URL: &str = "https://api.kite.trade";

const KITE_VERSION: &str = "3";
const HISTORICAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CANDLE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Connection settings for [`KiteClient`].
#[derive(Clone)]
pub struct KiteConfig {
    pub base_url: String,
    pub api_key: String,
    /// Needed only for the session exchange.
    pub api_secret: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for KiteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_secret(&self.api_key))
            .field("api_secret", &self.api_secret.as_deref().map(mask_secret))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KiteConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: KITE_API_URL.to_string(),
            api_key: api_key.into(),
            api_secret: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `hex(sha256(api_key + request_token + api_secret))`.
#[must_use]
pub fn session_checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

type InstrumentCache = HashMap<String, (NaiveDate, Arc<Vec<Instrument>>)>;

/// Kite Connect v3 client.
///
/// The access token can be swapped at runtime after a postback login.
/// Instrument dumps are cached per exchange for the IST day.
pub struct KiteClient {
    config: KiteConfig,
    http: Client,
    access_token: RwLock<Option<String>>,
    instruments: Mutex<InstrumentCache>,
}

impl std::fmt::Debug for KiteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteClient")
            .field("config", &self.config)
            .field("authenticated", &self.has_access_token())
            .finish_non_exhaustive()
    }
}

impl KiteClient {
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: KiteConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Connection(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http,
            access_token: RwLock::new(None),
            instruments: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub fn with_access_token(self, token: Option<String>) -> Self {
        *self.access_token.write() = token.filter(|t| !t.is_empty());
        self
    }

    pub fn set_access_token(&self, token: &str) {
        debug!(token = %mask_secret(token), "Kite access token updated");
        *self.access_token.write() = Some(token.to_string());
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.read().is_some()
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .access_token
            .read()
            .clone()
            .ok_or(Error::Broker(BrokerError::NotAuthenticated))?;
        Ok(request
            .header("X-Kite-Version", KITE_VERSION)
            .header(
                "Authorization",
                format!("token {}:{}", self.config.api_key, token),
            ))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(path, "GET");
        let request = self.authorized(self.http.get(self.url(path)).query(query))?;
        Self::unwrap_envelope(request.send().await?).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T> {
        debug!(path, "POST");
        let request = self.authorized(self.http.post(self.url(path)).form(form))?;
        Self::unwrap_envelope(request.send().await?).await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;
        match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) if envelope.status == "success" => envelope.data.ok_or_else(|| {
                Error::Broker(BrokerError::UnexpectedResponse(
                    "success without data".to_string(),
                ))
            }),
            Ok(envelope) => Err(Error::Broker(BrokerError::Api {
                error_type: envelope
                    .error_type
                    .unwrap_or_else(|| "UnknownException".to_string()),
                message: envelope.message.unwrap_or_default(),
            })),
            Err(e) if status.is_success() => {
                Err(Error::Broker(BrokerError::UnexpectedResponse(e.to_string())))
            }
            Err(_) => Err(Error::Broker(BrokerError::Api {
                error_type: "HttpError".to_string(),
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&body).chars().take(200).collect::<String>()
                ),
            })),
        }
    }

    /// Full instrument list for `exchange`, cached for the IST day.
    ///
    /// # Errors
    /// Fails on transport errors or a malformed CSV.
    pub async fn instruments(&self, exchange: &str) -> Result<Arc<Vec<Instrument>>> {
        let today = ist_date(Utc::now());
        if let Some((day, list)) = self.instruments.lock().get(exchange) {
            if *day == today {
                return Ok(list.clone());
            }
        }

        let path = format!("/instruments/{exchange}");
        let request = self.authorized(self.http.get(self.url(&path)))?;
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Broker(BrokerError::Api {
                error_type: "HttpError".to_string(),
                message: format!("HTTP {} fetching instruments", status.as_u16()),
            }));
        }

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut list = Vec::new();
        for record in reader.deserialize::<InstrumentRecord>() {
            let record = record.map_err(|e| Error::Parse(format!("instrument csv: {e}")))?;
            list.push(Instrument::from(record));
        }
        info!(exchange, count = list.len(), "Instruments loaded");

        let list = Arc::new(list);
        self.instruments
            .lock()
            .insert(exchange.to_string(), (today, list.clone()));
        Ok(list)
    }

    /// Trade a request token for an access token.
    ///
    /// # Errors
    /// Fails when no API secret is configured or Kite rejects the token.
    pub async fn generate_session(&self, request_token: &str) -> Result<SessionGrant> {
        let secret = self
            .config
            .api_secret
            .as_deref()
            .ok_or(Error::Config(ConfigError::MissingField {
                field: "ZAPI_SECRET",
            }))?;
        let checksum = session_checksum(&self.config.api_key, request_token, secret);
        let form = [
            ("api_key", self.config.api_key.clone()),
            ("request_token", request_token.to_string()),
            ("checksum", checksum),
        ];
        let response = self
            .http
            .post(self.url("/session/token"))
            .header("X-Kite-Version", KITE_VERSION)
            .form(&form)
            .send()
            .await?;
        let data: SessionData = Self::unwrap_envelope(response).await?;
        info!(
            user_id = %data.user_id,
            token = %mask_secret(&data.access_token),
            "Kite session generated"
        );
        self.set_access_token(&data.access_token);
        Ok(SessionGrant {
            access_token: data.access_token,
            user_id: data.user_id,
            user_name: data.user_name,
            login_time: data.login_time,
        })
    }
}

fn parse_candle(row: (String, f64, f64, f64, f64, f64)) -> Result<Candle> {
    let (ts, open, high, low, close, volume) = row;
    let timestamp = DateTime::parse_from_str(&ts, CANDLE_TIME_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(&ts))
        .map_err(|e| Error::Parse(format!("candle timestamp {ts}: {e}")))?
        .with_timezone(&Utc);
    Ok(Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

#[async_trait]
impl Broker for KiteClient {
    async fn available_balance(&self) -> Result<Price> {
        let margins: Margins = self.get("/user/margins", &[]).await?;
        let equity = margins.equity.ok_or_else(|| {
            Error::Broker(BrokerError::UnexpectedResponse(
                "margins without equity segment".to_string(),
            ))
        })?;
        Ok(price_from_f64(equity.available.live_balance))
    }

    async fn ltp(&self, instrument: &str) -> Result<Price> {
        let data: LtpData = self
            .get("/quote/ltp", &[("i", instrument.to_string())])
            .await?;
        data.get(instrument)
            .map(|q| price_from_f64(q.last_price))
            .ok_or_else(|| Error::Broker(BrokerError::InstrumentNotFound(instrument.to_string())))
    }

    async fn historical(
        &self,
        token: u64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>> {
        let path = format!("/instruments/historical/{token}/{}", interval.as_str());
        let query = [
            (
                "from",
                from.with_timezone(&ist()).format(HISTORICAL_TIME_FORMAT).to_string(),
            ),
            (
                "to",
                to.with_timezone(&ist()).format(HISTORICAL_TIME_FORMAT).to_string(),
            ),
        ];
        let data: HistoricalData = self.get(&path, &query).await?;
        let candles = data
            .candles
            .into_iter()
            .map(parse_candle)
            .collect::<Result<Vec<_>>>()?;
        debug!(token, count = candles.len(), "Historical candles");
        Ok(candles)
    }

    async fn find_instrument(&self, exchange: &str, tradingsymbol: &str) -> Result<Instrument> {
        self.instruments(exchange)
            .await?
            .iter()
            .find(|i| i.tradingsymbol == tradingsymbol)
            .cloned()
            .ok_or_else(|| {
                Error::Broker(BrokerError::InstrumentNotFound(format!(
                    "{exchange}:{tradingsymbol}"
                )))
            })
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let mut form = vec![
            ("tradingsymbol", order.tradingsymbol.clone()),
            ("exchange", order.exchange.clone()),
            ("transaction_type", order.transaction_type.as_str().to_string()),
            ("order_type", order.order_type.as_str().to_string()),
            ("quantity", order.quantity.to_string()),
            ("product", order.product.clone()),
            ("validity", "DAY".to_string()),
        ];
        if order.order_type == OrderType::Limit {
            if let Some(price) = order.price {
                form.push(("price", price.to_string()));
            }
        }
        if let Some(tag) = &order.tag {
            form.push(("tag", tag.clone()));
        }

        let data: OrderData = self
            .post_form("/orders/regular", &form)
            .await
            .map_err(|e| match e {
                Error::Broker(BrokerError::Api { message, .. }) => {
                    warn!(symbol = %order.tradingsymbol, reason = %message, "Order rejected");
                    Error::Broker(BrokerError::OrderRejected(message))
                }
                other => other,
            })?;
        info!(
            order_id = %data.order_id,
            symbol = %order.tradingsymbol,
            side = order.transaction_type.as_str(),
            qty = order.quantity,
            "Order placed"
        );
        Ok(OrderAck {
            order_id: data.order_id,
            fill_price: None,
        })
    }
}

#[async_trait]
impl SessionExchanger for KiteClient {
    async fn exchange(&self, request_token: &str) -> Result<SessionGrant> {
        self.generate_session(request_token).await
    }
}
