use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON error returned before any audio has been sent
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("method not allowed, use POST")]
    MethodNotAllowed,

    #[error("invalid JSON body")]
    InvalidJson,

    #[error("missing required field: url")]
    MissingUrl,

    #[error("timed out reading request body")]
    BodyTimeout,

    #[error("{message}")]
    Download { message: String, url: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidJson | ApiError::MissingUrl => StatusCode::BAD_REQUEST,
            ApiError::BodyTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Download { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let url = match &self {
            ApiError::Download { url, .. } => Some(url.as_str()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            url,
        };

        json_response(self.status(), &body)
    }
}

/// Serialize `value` as a JSON line, the way a streaming JSON encoder would
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(mut body) => {
            body.push(b'\n');
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(e) => {
            tracing::error!("failed to encode JSON response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
