//! Control API errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::http::cookies::UnknownCookie;
use crate::mocks::BrokerError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("missing mock `{0}`")]
    UnknownMock(String),

    #[error("route not found: {method} {url_mask}")]
    RouteNotFound { method: String, url_mask: String },

    #[error("static route not found: {0}")]
    StaticRouteNotFound(String),

    #[error("`{0}` must be a boolean")]
    ExpectedBoolean(&'static str),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    UnknownCookie(#[from] UnknownCookie),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request body too large")]
    BodyTooLarge,

    #[error("request body length does not match Content-Length")]
    LengthMismatch,

    #[error("unparseable request body: {0}")]
    Unparseable(String),

    #[error("watcher error: {0}")]
    Watcher(String),
}

impl ControlError {
    pub fn status(&self) -> StatusCode {
        match self {
            ControlError::LengthMismatch => StatusCode::BAD_REQUEST,
            ControlError::Watcher(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<BrokerError> for ControlError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::UnknownMock(file) => ControlError::UnknownMock(file),
            other => ControlError::InvalidValue(other.to_string()),
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Control request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
