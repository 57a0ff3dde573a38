//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                ┌──────────────────────────┐
//!   Telegram ───►│                          │───► Kite Connect (Broker)
//!   HTTP     ───►│   Application services   │───► SQLite (TradeStore)
//!   CLI      ───►│                          │───► .env (CredentialStore)
//!                └──────────────────────────┘───► Notifier
//! ```
//!
//! - [`inbound`]: what driving adapters call into
//! - [`outbound`]: what the application needs from infrastructure

pub mod inbound;
pub mod outbound;
