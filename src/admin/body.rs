//! Bounded JSON body extractor for control requests.

use axum::{
    body::Body,
    extract::FromRequest,
    http::{header, Request},
};
use serde::de::DeserializeOwned;

use crate::admin::error::ControlError;
use crate::http::server::AppState;

/// JSON body limited to `limits.max_body_bytes`.
///
/// Unlike `axum::Json` it does not insist on a `Content-Type`, and its
/// rejections use the control API's error shape.
#[derive(Debug)]
pub struct ControlBody<T>(pub T);

impl<T> FromRequest<AppState> for ControlBody<T>
where
    T: DeserializeOwned,
{
    type Rejection = ControlError;

    async fn from_request(request: Request<Body>, state: &AppState) -> Result<Self, Self::Rejection> {
        let limit = state.config.limits.max_body_bytes;
        let declared = request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        if declared.is_some_and(|len| len > limit) {
            return Err(ControlError::BodyTooLarge);
        }

        let bytes = axum::body::to_bytes(request.into_body(), limit)
            .await
            .map_err(|_| match declared {
                // a declared length within the limit that still failed was a short or long body
                Some(_) => ControlError::LengthMismatch,
                None => ControlError::BodyTooLarge,
            })?;

        if declared.is_some_and(|len| len != bytes.len()) {
            return Err(ControlError::LengthMismatch);
        }

        serde_json::from_slice(&bytes)
            .map(ControlBody)
            .map_err(|e| ControlError::Unparseable(e.to_string()))
    }
}
