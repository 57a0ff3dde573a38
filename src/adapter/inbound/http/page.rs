//! Server-rendered HTML pages.

use chrono::{DateTime, Utc};

use crate::domain::calendar::ist;
use crate::domain::{AuthStatus, PendingAuth, TradingMode};
use crate::port::inbound::runtime::TokenView;

pub struct DashboardView {
    pub mode: TradingMode,
    pub pending: Vec<PendingAuth>,
    pub token: TokenView,
    pub trading_allowed: bool,
    pub market_open: bool,
    pub now: DateTime<Utc>,
}

const STYLE: &str = "body{font-family:sans-serif;max-width:40rem;margin:2rem auto;padding:0 1rem}\
    .ok{color:#1a7f37}.bad{color:#cf222e}td{padding:.2rem .8rem .2rem 0}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title>\
        <style>{STYLE}</style></head><body>{body}</body></html>",
        escape_html(title)
    )
}

fn ist_stamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&ist()).format("%Y-%m-%d %H:%M:%S IST").to_string()
}

fn flag(ok: bool, yes: &str, no: &str) -> String {
    if ok {
        format!("<span class=\"ok\">{yes}</span>")
    } else {
        format!("<span class=\"bad\">{no}</span>")
    }
}

/// Operator landing page.
#[must_use]
pub fn dashboard(view: &DashboardView) -> String {
    let token = if view.token.present {
        flag(view.token.valid, "valid", "expired")
    } else {
        flag(false, "", "missing")
    };
    let expires = view
        .token
        .expires_at
        .map_or_else(|| "-".to_string(), ist_stamp);

    let login = match view.pending.last() {
        Some(p) => format!(
            "<p><a href=\"{}\">Continue pending login</a> (expires {})</p>",
            escape_html(&p.login_url),
            ist_stamp(p.expires_at)
        ),
        None => "<p><a href=\"/auth/generate\">Generate a login link</a></p>".to_string(),
    };

    let body = format!(
        "<h1>SENSEX Bot</h1>\
        <table>\
        <tr><td>Mode</td><td>{}</td></tr>\
        <tr><td>Market</td><td>{}</td></tr>\
        <tr><td>Trading</td><td>{}</td></tr>\
        <tr><td>Access token</td><td>{} (expires {})</td></tr>\
        <tr><td>Pending logins</td><td>{}</td></tr>\
        </table>{}<p><small>{}</small></p>",
        view.mode.as_str().to_uppercase(),
        flag(view.market_open, "open", "closed"),
        flag(view.trading_allowed, "allowed", "blocked"),
        token,
        expires,
        view.pending.len(),
        login,
        ist_stamp(view.now),
    );
    layout("SENSEX Bot", &body)
}

/// Confirmation shown after the postback redirect.
#[must_use]
pub fn success(session: Option<&PendingAuth>) -> String {
    let body = match session {
        Some(s) if s.status == AuthStatus::Completed => format!(
            "<h1 class=\"ok\">Authentication successful</h1>\
            <p>Mode: {}</p><p>Completed: {}</p>\
            <p>The access token has been saved. You can close this window.</p>",
            s.mode.as_str().to_uppercase(),
            s.completed_at.map_or_else(|| "-".to_string(), ist_stamp),
        ),
        Some(s) => format!(
            "<h1 class=\"bad\">Login {}</h1><p>{}</p>",
            escape_html(s.status.as_str()),
            escape_html(s.error.as_deref().unwrap_or("No further details."))
        ),
        None => "<h1>Login finished</h1><p>No session details available.</p>".to_string(),
    };
    layout("Kite login", &body)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::market_hours;
    use chrono::Duration;

    fn pending(status: AuthStatus) -> PendingAuth {
        let now = market_hours();
        PendingAuth {
            state: "s1".to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(300),
            status,
            mode: TradingMode::Live,
            login_url: "https://kite.zerodha.com/connect/login?api_key=k&v=3".to_string(),
            postback_url: "http://localhost:8001/postback".to_string(),
            completed_at: Some(now),
            error: Some("<script>".to_string()),
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn success_page_reflects_status() {
        let done = success(Some(&pending(AuthStatus::Completed)));
        assert!(done.contains("Authentication successful"));
        assert!(done.contains("LIVE"));

        let failed = success(Some(&pending(AuthStatus::Failed)));
        assert!(failed.contains("Login failed"));
        assert!(failed.contains("&lt;script&gt;"));
        assert!(!failed.contains("<script>"));
    }

    #[test]
    fn dashboard_links_pending_login() {
        let view = DashboardView {
            mode: TradingMode::Paper,
            pending: vec![pending(AuthStatus::Pending)],
            token: TokenView {
                present: false,
                preview: None,
                issued_at: None,
                expires_at: None,
                valid: false,
            },
            trading_allowed: false,
            market_open: true,
            now: market_hours(),
        };
        let html = dashboard(&view);
        assert!(html.contains("PAPER"));
        assert!(html.contains("Continue pending login"));
        assert!(html.contains("api_key=k&amp;v=3"));
        assert!(html.contains("missing"));
    }
}
