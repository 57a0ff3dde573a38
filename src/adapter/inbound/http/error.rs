//! JSON error bodies for the postback server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{AuthError, Error};

/// Handler error rendered as `{ "ok": false, "error": "..." }`.
#[derive(Debug)]
pub enum ApiError {
    /// Postback or login rejected; the message is safe for the browser.
    Auth(AuthError),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Auth(e) => e.to_string(),
            Self::BadRequest(m) | Self::Internal(m) => m.clone(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Auth(auth) => Self::Auth(auth),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "ok": false, "error": self.message() });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_bad_requests() {
        let err = ApiError::from(AuthError::Expired);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Session expired");
    }

    #[test]
    fn storage_errors_are_internal() {
        let err = ApiError::from(Error::Database("locked".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn wrapped_auth_error_keeps_its_message() {
        let err = ApiError::from(Error::Auth(AuthError::UnknownSession));
        assert_eq!(err.message(), "Invalid authentication session");
    }
}
