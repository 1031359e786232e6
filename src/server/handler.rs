use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::GatewayError;
use super::types::{ConversionRequest, ConversionResponse};
use super::AppState;
use crate::utils::content_guard::is_accepted_pdf_type;
use crate::utils::drive_url;
use crate::utils::pdf::{ExtractionError, ExtractionResult};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `x-api-key` does not exactly match the configured secret.
/// Runs before the body is read.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        error!("API_KEY not set; rejecting request");
        return GatewayError::Config.into_response();
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(expected) {
        warn!(
            path = %request.uri().path(),
            present = provided.is_some(),
            "Rejected request with invalid API key"
        );
        return GatewayError::Auth.into_response();
    }

    next.run(request).await
}

pub async fn convert(State(state): State<AppState>, body: Bytes) -> Response {
    match convert_document(&state, &body).await {
        Ok(result) => (StatusCode::OK, Json(ConversionResponse::from(result))).into_response(),
        Err(err) => {
            match &err {
                GatewayError::Extraction(_) | GatewayError::Internal(_) => {
                    error!("Conversion failed: {}", err)
                }
                _ => warn!("Conversion rejected: {}", err),
            }
            err.to_response(state.config.error_details)
        }
    }
}

async fn convert_document(
    state: &AppState,
    body: &[u8],
) -> Result<ExtractionResult, GatewayError> {
    let request = ConversionRequest::from_body(body)?;
    let target = drive_url::normalize(&request.pdf_url)?;

    info!(url = %target, drive_file_id = ?target.drive_file_id(), "Converting PDF");

    let document = state.fetcher.fetch(target.as_url()).await?;
    if document.final_url.as_str() != target.as_url().as_str() {
        debug!(url = %target, final_url = %document.final_url, "Fetch was redirected");
    }

    if !is_accepted_pdf_type(document.content_type.as_deref()) {
        return Err(GatewayError::NotAPdf {
            content_type: document.content_type,
            url: target.as_str().to_string(),
        });
    }

    let extractor = Arc::clone(&state.extractor);
    let bytes = document.bytes;
    let size = bytes.len();
    let started = Instant::now();

    let result = match tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await {
        Ok(outcome) => outcome?,
        Err(e) if e.is_panic() => {
            return Err(ExtractionError::new(format!("extractor panicked: {}", e)).into())
        }
        Err(e) => return Err(GatewayError::Internal(format!("extraction task failed: {}", e))),
    };

    info!(
        url = %target,
        size = size,
        pages = result.num_pages,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "PDF extraction succeeded"
    );

    Ok(result)
}
