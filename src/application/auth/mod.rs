//! Postback authentication: login sessions and request-token exchange.

mod service;

pub use service::{
    token_view, AuthOutcome, AuthService, AuthSettings, AuthSummary, TokenListener, KITE_LOGIN_URL,
};
