use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::utils::drive_url::InvalidUrl;
use crate::utils::fetcher::FetchError;
use crate::utils::pdf::ExtractionError;

pub const MSG_CONFIG: &str = "Server configuration error";
pub const MSG_AUTH: &str = "Invalid API key";
pub const MSG_URL_REQUIRED: &str = "PDF URL is required";
pub const MSG_URL_INVALID: &str = "Invalid URL format";
pub const MSG_NOT_A_PDF: &str = "URL does not point to a PDF file or is not accessible";
pub const MSG_TIMEOUT: &str = "Request timeout while fetching PDF";
pub const MSG_UNREACHABLE: &str = "Unable to reach PDF URL";
pub const MSG_EXTRACTION: &str = "Failed to extract text from PDF";
pub const MSG_INTERNAL: &str = "Internal server error";

/// Every way a conversion request can fail, one variant per response shape.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API_KEY is not configured")]
    Config,

    #[error("missing or mismatched x-api-key header")]
    Auth,

    #[error("request body has no pdfUrl")]
    MissingUrl,

    #[error("pdfUrl is not a string")]
    MalformedUrl,

    #[error(transparent)]
    InvalidUrl(#[from] InvalidUrl),

    #[error("content type {content_type:?} of {url} is not a PDF")]
    NotAPdf {
        content_type: Option<String>,
        url: String,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Auth => StatusCode::UNAUTHORIZED,
            GatewayError::MissingUrl
            | GatewayError::MalformedUrl
            | GatewayError::InvalidUrl(_)
            | GatewayError::NotAPdf { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Fetch(FetchError::Timeout { .. }) => StatusCode::REQUEST_TIMEOUT,
            GatewayError::Fetch(FetchError::Unreachable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Fetch(FetchError::Upstream { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::Extraction(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Never includes upstream error text except the
    /// upstream status phrase.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Config => MSG_CONFIG.to_string(),
            GatewayError::Auth => MSG_AUTH.to_string(),
            GatewayError::MissingUrl => MSG_URL_REQUIRED.to_string(),
            GatewayError::MalformedUrl | GatewayError::InvalidUrl(_) => {
                MSG_URL_INVALID.to_string()
            }
            GatewayError::NotAPdf { .. } => MSG_NOT_A_PDF.to_string(),
            GatewayError::Fetch(FetchError::Timeout { .. }) => MSG_TIMEOUT.to_string(),
            GatewayError::Fetch(FetchError::Unreachable { .. }) => MSG_UNREACHABLE.to_string(),
            GatewayError::Fetch(FetchError::Upstream { status_text, .. }) => {
                format!("Failed to fetch PDF: {}", status_text)
            }
            GatewayError::Extraction(_) => MSG_EXTRACTION.to_string(),
            GatewayError::Internal(_) => MSG_INTERNAL.to_string(),
        }
    }

    /// JSON body for this error.
    ///
    /// Request-level rejections use `{error}`; failures after validation use
    /// `{status: "error", message}` plus `details` when `include_details` is set.
    pub fn body(&self, include_details: bool) -> Value {
        match self {
            GatewayError::Config
            | GatewayError::Auth
            | GatewayError::MissingUrl
            | GatewayError::MalformedUrl
            | GatewayError::InvalidUrl(_) => json!({ "error": self.public_message() }),
            GatewayError::NotAPdf { content_type, url } => {
                let mut body = json!({
                    "error": self.public_message(),
                    "url": url,
                });
                if let Some(ct) = content_type {
                    body["contentType"] = json!(ct);
                }
                body
            }
            _ => {
                let mut body = json!({
                    "status": "error",
                    "message": self.public_message(),
                });
                if include_details {
                    body["details"] = json!(self.to_string());
                }
                body
            }
        }
    }

    pub fn to_response(&self, include_details: bool) -> Response {
        (self.status_code(), Json(self.body(include_details))).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}
