use axum::{
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use super::error::{json_response, ApiError};
use super::gate::{self, DownloadJob};
use super::AppState;
use crate::utils::{extract_domain, mp3_filename, FALLBACK_TITLE};

/// Largest request body accepted by /download
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// GET /health
pub async fn health() -> Response {
    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

/// Any method other than POST on /download
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// POST /download
pub async fn download(State(state): State<AppState>, body: Body) -> Result<Response, ApiError> {
    let body = read_body(body, &state).await?;
    let url = parse_url(&body)?;

    let span = tracing::info_span!(
        "download",
        request_id = %uuid::Uuid::new_v4(),
        host = extract_domain(&url).as_deref().unwrap_or("-"),
    );

    run_download(state, url).instrument(span).await
}

/// Decode the first JSON value of the body; anything after it is ignored.
///
/// `null` and objects without a usable `url` are missing-field errors. Other
/// JSON values, and bodies with no value at all, are invalid.
fn parse_url(body: &[u8]) -> Result<String, ApiError> {
    let first = serde_json::Deserializer::from_slice(body)
        .into_iter::<Value>()
        .next();

    let request = match first {
        Some(Ok(Value::Null)) => return Err(ApiError::MissingUrl),
        Some(Ok(value @ Value::Object(_))) => {
            serde_json::from_value::<DownloadRequest>(value).map_err(|_| ApiError::InvalidJson)?
        }
        Some(Ok(_)) | Some(Err(_)) | None => return Err(ApiError::InvalidJson),
    };

    match request.url {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(ApiError::MissingUrl),
    }
}

async fn run_download(state: AppState, url: String) -> Result<Response, ApiError> {
    tracing::info!("download request: {}", url);

    let title = match state.source.fetch_title(&url).await {
        Ok(title) => title,
        Err(e) => {
            tracing::warn!(
                "could not fetch title for {}: {} (continuing with fallback name)",
                url,
                e
            );
            FALLBACK_TITLE.to_string()
        }
    };

    let job = DownloadJob {
        url,
        filename: mp3_filename(&title),
        peek_bytes: state.peek_bytes,
    };

    gate::respond(state.source.clone(), job, state.shutdown.child_token()).await
}

async fn read_body(body: Body, state: &AppState) -> Result<Bytes, ApiError> {
    match tokio::time::timeout(
        state.read_timeout,
        axum::body::to_bytes(body, MAX_BODY_BYTES),
    )
    .await
    {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => {
            tracing::debug!("failed to read request body: {}", e);
            Err(ApiError::InvalidJson)
        }
        Err(_) => Err(ApiError::BodyTimeout),
    }
}
