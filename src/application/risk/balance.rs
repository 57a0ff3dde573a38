//! Balance lookup used by the sizing rule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::domain::money::Price;
use crate::domain::TradingMode;
use crate::port::inbound::runtime::{BalanceOrigin, BalanceView};
use crate::port::outbound::broker::Broker;

/// How long a broker balance is reused.
pub const BALANCE_TTL: Duration = Duration::from_secs(30);

/// Balance provider with a short cache and a fixed fallback.
///
/// Test and paper modes always report the virtual balance. Live mode asks
/// the broker, caches for [`BALANCE_TTL`], and falls back to the emergency
/// balance on error.
pub struct BalanceSource {
    mode: TradingMode,
    broker: Option<Arc<dyn Broker>>,
    virtual_balance: Price,
    emergency_balance: Price,
    ttl: Duration,
    cache: Mutex<Option<(Instant, Price)>>,
}

impl BalanceSource {
    #[must_use]
    pub fn new(
        mode: TradingMode,
        broker: Option<Arc<dyn Broker>>,
        virtual_balance: Price,
        emergency_balance: Price,
    ) -> Self {
        Self {
            mode,
            broker,
            virtual_balance,
            emergency_balance,
            ttl: BALANCE_TTL,
            cache: Mutex::new(None),
        }
    }

    /// Override the cache lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn available(&self) -> BalanceView {
        if !self.mode.is_live() {
            return BalanceView {
                amount: self.virtual_balance,
                origin: BalanceOrigin::Virtual,
            };
        }

        if let Some((at, amount)) = *self.cache.lock() {
            if at.elapsed() < self.ttl {
                return BalanceView {
                    amount,
                    origin: BalanceOrigin::Cached,
                };
            }
        }

        let Some(broker) = &self.broker else {
            warn!(balance = %self.emergency_balance, "No broker configured, using emergency balance");
            return self.emergency();
        };

        match broker.available_balance().await {
            Ok(amount) => {
                debug!(balance = %amount, "Fresh balance");
                *self.cache.lock() = Some((Instant::now(), amount));
                BalanceView {
                    amount,
                    origin: BalanceOrigin::Live,
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    balance = %self.emergency_balance,
                    "Balance fetch failed, using emergency balance"
                );
                self.emergency()
            }
        }
    }

    /// Drop any cached broker value.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    fn emergency(&self) -> BalanceView {
        BalanceView {
            amount: self.emergency_balance,
            origin: BalanceOrigin::Emergency,
        }
    }
}
