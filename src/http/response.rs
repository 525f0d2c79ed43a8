use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Body of every successful response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
        message: None,
    })
}

pub fn success_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data: Some(data),
        message: Some(message.into()),
    })
}

pub fn message(message: impl Into<String>) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        data: None,
        message: Some(message.into()),
    })
}

/// Errors returned by handlers.
///
/// Rendered as `{"success": false, "error": ...}`. `Failed` may carry the
/// underlying error text, which is only filled in for development
/// deployments and is sent as `message`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Unavailable(&'static str),
    #[error("{message}")]
    Failed {
        status: StatusCode,
        message: &'static str,
        detail: Option<String>,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Logs `error` and builds a 500 whose detail is exposed only when
    /// `expose_detail` is set.
    pub fn internal(message: &'static str, error: impl std::fmt::Display, expose_detail: bool) -> Self {
        Self::failed(StatusCode::INTERNAL_SERVER_ERROR, message, error, expose_detail)
    }

    pub fn failed(
        status: StatusCode,
        message: &'static str,
        error: impl std::fmt::Display,
        expose_detail: bool,
    ) -> Self {
        tracing::error!(error = %error, status = status.as_u16(), "{}", message);
        Self::Failed {
            status,
            message,
            detail: expose_detail.then(|| error.to_string()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Failed { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let Self::Failed {
            detail: Some(detail),
            ..
        } = &self
        {
            body["message"] = json!(detail);
        }
        (status, Json(body)).into_response()
    }
}

/// Decode an optional JSON body: empty means `T::default()`.
pub fn json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}
