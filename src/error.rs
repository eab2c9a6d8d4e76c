use std::any::Any;

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("attachment {index}: invalid base64: {source}")]
    Decode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("attachment {index}: expected a base64 string")]
    NotAString { index: usize },
    #[error("attachment {index}: failed to stage: {source}")]
    Io {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}

/// The transmission subsystem rejected or failed a send.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransmissionError(pub String);

impl TransmissionError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    AttachmentDecode(#[from] AttachmentError),
    #[error(transparent)]
    Transmission(#[from] TransmissionError),
    #[error(transparent)]
    BodyRejected(#[from] BytesRejection),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BodyRejected(rejection) => rejection.status(),
            Self::AttachmentDecode(_) | Self::Transmission(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Used by the panic-catching layer so a panicking handler still answers
/// with the JSON error shape.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    log::error!("Handler panicked: {}", detail);
    ApiError::Internal("Internal server error".to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_shape() {
        let resp = ApiError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await, json!({ "error": "Unauthorized" }));
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let resp = ApiError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({ "error": "Not found" }));
    }

    #[tokio::test]
    async fn test_transmission_error_carries_detail() {
        let resp = ApiError::from(TransmissionError::new("radio off")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(resp).await, json!({ "error": "radio off" }));
    }

    #[tokio::test]
    async fn test_panic_response_is_internal_json() {
        let resp = panic_response(Box::new("boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({ "error": "Internal server error" })
        );
    }
}
