//! Error responses
//!
//! Every failure is a JSON object with a single `error` field. Status codes
//! follow the error kind rather than always returning 200.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use spotwatch_common::Error;
use tracing::{error, warn};

/// Handler error wrapping the common error taxonomy
#[derive(Debug)]
pub enum ApiError {
    /// Request body was not a JSON object
    InvalidBody,
    Domain(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Domain(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => match err {
                Error::Validation { .. } => StatusCode::BAD_REQUEST,
                Error::AlreadyExists(_) => StatusCode::CONFLICT,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::MissingAuth | Error::AuthFailed(_) => StatusCode::UNAUTHORIZED,
                Error::Store(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::InvalidBody => {
                "Invalid data type provided. Please ensure the request body is a JSON object."
                    .to_string()
            }
            ApiError::Domain(err) => err.to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Parse a request body as a JSON object, whatever its Content-Type
///
/// An empty body is treated as `{}`.
pub fn parse_payload(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ApiError::InvalidBody),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload() {
        assert!(parse_payload(&Bytes::from_static(b"")).unwrap().is_empty());
        assert_eq!(
            parse_payload(&Bytes::from_static(br#"{"key": "k"}"#)).unwrap()["key"],
            "k"
        );
        assert!(parse_payload(&Bytes::from_static(b"[1, 2]")).is_err());
        assert!(parse_payload(&Bytes::from_static(b"key=k")).is_err());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::validation("type"), StatusCode::BAD_REQUEST),
            (Error::AlreadyExists("Sensor s1".into()), StatusCode::CONFLICT),
            (Error::NotFound("Spot a".into()), StatusCode::NOT_FOUND),
            (Error::MissingAuth, StatusCode::UNAUTHORIZED),
            (Error::AuthFailed("s1".into()), StatusCode::UNAUTHORIZED),
            (Error::Store("timeout".into()), StatusCode::BAD_GATEWAY),
            (Error::Config("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
